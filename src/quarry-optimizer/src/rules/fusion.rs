//! Comprehension fusion (R3).

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_logical::{free_vars, fresh_name, occurs_free, rename_bound, substitute, Term, TypeEnv};

use super::rule::{empty_like, rewrite_bottom_up, RewriteRule, Transformed};

/// Comprehension fusion rule (commuting conversion).
///
/// # Rewrites
///
/// - `for y in (for x in L where p do M) where q do N` becomes
///   `for x in L where p do (for y in M where q do N)`, renaming `x` when it
///   is free in `q` or `N`
/// - `for y in yield M where q do N` becomes
///   `if q[y := M] then N[y := M] else empty`, or `N[y := M]` without a
///   predicate
pub struct ComprehensionFusion;

impl RewriteRule for ComprehensionFusion {
    fn name(&self) -> &'static str {
        "ComprehensionFusion"
    }

    fn description(&self) -> &'static str {
        "Unnest comprehensions in generator position"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut fuse)
    }
}

fn fuse(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
    let Term::For {
        source,
        binder,
        predicate,
        body,
    } = term
    else {
        return Ok((term, false));
    };
    let predicate = predicate.map(|p| *p);

    match *source {
        inner @ Term::For { .. } => Ok((fuse_nested(inner, binder, predicate, *body)?, true)),
        Term::Yield(element) => {
            let body = substitute(&binder, &element, *body)?;
            let fused = match predicate {
                Some(p) => {
                    let cond = substitute(&binder, &element, p)?;
                    let empty = empty_like(&body, env)?;
                    Term::if_then_else(cond, body, empty)
                }
                None => body,
            };
            Ok((fused, true))
        }
        source => Ok((Term::comprehension(source, binder, predicate, *body), false)),
    }
}

/// `for y in (for x in L where p do M) where q do N`.
fn fuse_nested(inner: Term, y: String, q: Option<Term>, n: Term) -> QuarryResult<Term> {
    let Term::For { binder: x, .. } = &inner else {
        return Ok(Term::comprehension(inner, y, q, n));
    };

    let captures = *x != y
        && (q.as_ref().is_some_and(|q| occurs_free(x, q)) || occurs_free(x, &n));
    let inner = if captures {
        let mut avoid: BTreeSet<String> = free_vars(&inner);
        avoid.extend(free_vars(&n));
        if let Some(q) = &q {
            avoid.extend(free_vars(q));
        }
        avoid.insert(y.clone());
        avoid.insert(x.clone());
        let fresh = fresh_name(x, &avoid);
        log::trace!("renaming generator binder `{x}` to `{fresh}` during fusion");
        rename_bound(inner, &fresh)?
    } else {
        inner
    };

    let Term::For {
        source: l,
        binder: x,
        predicate: p,
        body: m,
    } = inner
    else {
        return Ok(Term::comprehension(inner, y, q, n));
    };

    Ok(Term::comprehension(
        *l,
        x,
        p.map(|p| *p),
        Term::comprehension(*m, y, q, n),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{DataType, RecordType, Type};
    use quarry_logical::alpha_equals;
    use quarry_logical::term::{empty, for_each, for_where, if_then_else, lit, record, var, yield_};

    fn people() -> Term {
        Term::table(
            "People",
            RecordType::new()
                .with_field("Name", DataType::String)
                .with_field("Age", DataType::Int64),
        )
    }

    #[test]
    fn test_wrapper_collapses() {
        // for p in (for u in People where u.Age >= 30 do yield {name = u.Name}) do yield p
        let inner = for_where(
            people(),
            "u",
            var("u").field("Age").gt_eq(lit(30i64)),
            yield_(record([("name", var("u").field("Name"))])),
        );
        let q = for_each(inner.clone(), "p", yield_(var("p")));

        let once = ComprehensionFusion.apply(q).unwrap();
        assert!(once.changed);
        let twice = ComprehensionFusion.apply(once.term).unwrap();
        assert!(twice.changed);
        assert!(alpha_equals(&twice.term, &inner));
    }

    #[test]
    fn test_renames_captured_binder() {
        // for y in (for x in People do yield x) do for x in People where x.Age < y.Age do yield x
        let q = for_each(
            for_each(people(), "x", yield_(var("x"))),
            "y",
            for_where(
                people(),
                "x",
                var("x").field("Age").lt(var("y").field("Age")),
                yield_(var("x")),
            ),
        );
        // The inner `x` is bound again in N, but not free: no renaming needed.
        let result = ComprehensionFusion.apply(q).unwrap();
        assert!(result.changed);

        // Now make the outer x free in N.
        let q = for_each(
            for_each(people(), "x", yield_(var("x"))),
            "y",
            yield_(record([("a", var("x")), ("b", var("y"))])),
        );
        let (fused, changed) = fuse(&mut TypeEnv::new(), q).unwrap();
        assert!(changed);
        let Term::For { binder, .. } = fused else {
            panic!("expected a comprehension");
        };
        assert_eq!(binder, "x_1");
    }

    #[test]
    fn test_yield_generator_with_predicate() {
        // for y in yield 3 where y > 1 do yield y
        let q = for_where(
            yield_(lit(3i64)),
            "y",
            var("y").gt(lit(1i64)),
            yield_(var("y")),
        );
        let result = ComprehensionFusion.apply(q).unwrap();
        assert!(result.changed);
        assert_eq!(
            result.term,
            if_then_else(
                lit(3i64).gt(lit(1i64)),
                yield_(lit(3i64)),
                empty(Type::int())
            )
        );
    }

    #[test]
    fn test_table_generator_untouched() {
        let q = for_each(people(), "u", yield_(var("u")));
        assert!(!ComprehensionFusion.apply(q).unwrap().changed);
    }
}
