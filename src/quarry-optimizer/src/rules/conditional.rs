//! Comprehensions over conditional generators (R4).

use common_error::QuarryResult;
use quarry_logical::{Term, TypeEnv};

use super::rule::{empty_for, rewrite_bottom_up, RewriteRule, Transformed};

/// Conditional generator rule.
///
/// # Rewrites
///
/// `for x in (if c then A else B) where p do N` becomes
///
/// ```text
/// (if c then (for x in A where p do N) else empty)
///   union (if NOT c then (for x in B where p do N) else empty)
/// ```
///
/// Both branches are guarded by the same condition, so each becomes a
/// separate flat comprehension.
pub struct ConditionalGenerator;

impl RewriteRule for ConditionalGenerator {
    fn name(&self) -> &'static str {
        "ConditionalGenerator"
    }

    fn description(&self) -> &'static str {
        "Split comprehensions over conditional generators into guarded branches"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut split)
    }
}

fn split(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
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
        Term::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let empty = empty_for(&then_branch, &binder, &body, env)?;
            let when_true = Term::comprehension(
                *then_branch,
                binder.clone(),
                predicate.clone(),
                (*body).clone(),
            );
            let when_false = Term::comprehension(*else_branch, binder, predicate, *body);

            Ok((
                Term::union_all(
                    Term::if_then_else((*cond).clone(), when_true, empty.clone()),
                    Term::if_then_else((*cond).not(), when_false, empty),
                ),
                true,
            ))
        }
        source => Ok((Term::comprehension(source, binder, predicate, *body), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{DataType, RecordType, Type};
    use quarry_logical::term::{empty, for_each, if_then_else, lit, union, var, yield_};

    fn table(name: &str) -> Term {
        Term::table(name, RecordType::new().with_field("Id", DataType::Int64))
    }

    #[test]
    fn test_split_conditional_generator() {
        // for x in (if flag then A else B) do yield x.Id
        let cond = lit(1i64).lt(lit(2i64));
        let q = for_each(
            if_then_else(cond.clone(), table("A"), table("B")),
            "x",
            yield_(var("x").field("Id")),
        );

        let result = ConditionalGenerator.apply(q).unwrap();
        assert!(result.changed);
        assert_eq!(
            result.term,
            union(
                if_then_else(
                    cond.clone(),
                    for_each(table("A"), "x", yield_(var("x").field("Id"))),
                    empty(Type::int())
                ),
                if_then_else(
                    cond.not(),
                    for_each(table("B"), "x", yield_(var("x").field("Id"))),
                    empty(Type::int())
                ),
            )
        );
    }

    #[test]
    fn test_other_generators_untouched() {
        let q = for_each(table("A"), "x", yield_(var("x")));
        assert!(!ConditionalGenerator.apply(q).unwrap().changed);
    }
}
