//! Guard normalization for conditionals in collection position.

use common_error::QuarryResult;
use quarry_logical::{Term, TypeEnv};

use super::rule::{empty_like, rewrite_bottom_up, RewriteRule, Transformed};

/// Guard normalization rule.
///
/// Brings every collection-typed conditional into the guard shape
/// `if c then M else empty` and moves guards outwards into the predicate of
/// the enclosing comprehension.
///
/// # Rewrites
///
/// - `if c then M else N` (N not empty) becomes
///   `(if c then M else empty) union (if NOT c then N else empty)`
/// - `if c then empty else empty` becomes `empty`
/// - `if c then (M union N) else empty` becomes
///   `(if c then M else empty) union (if c then N else empty)`
/// - `if c then (if d then M else empty) else empty` becomes
///   `if c AND d then M else empty`
/// - `for x in L where p do (if c then M else empty)` becomes
///   `for x in L where p AND c do M`
/// - `yield E[if c then a else b]`, where the conditional sits in record
///   position and a branch carries a collection, becomes
///   `(if c then yield E[a] else empty) union (if NOT c then yield E[b] else empty)`
pub struct GuardNormalization;

impl RewriteRule for GuardNormalization {
    fn name(&self) -> &'static str {
        "GuardNormalization"
    }

    fn description(&self) -> &'static str {
        "Normalize collection conditionals into guards and merge them into predicates"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut normalize_guard)
    }
}

fn normalize_guard(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
    match term {
        Term::If { .. } if term.is_collection_form() => split_conditional(env, term),
        Term::Yield(element) => match split_carrying_conditional(&element) {
            Some((cond, then_value, else_value)) => {
                let empty = empty_like(&Term::Yield(element), env)?;
                Ok((
                    Term::union_all(
                        Term::if_then_else(
                            cond.clone(),
                            Term::Yield(Box::new(then_value)),
                            empty.clone(),
                        ),
                        Term::if_then_else(cond.not(), Term::Yield(Box::new(else_value)), empty),
                    ),
                    true,
                ))
            }
            None => Ok((Term::Yield(element), false)),
        },
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => match *body {
            Term::If {
                cond,
                then_branch,
                else_branch,
            } if else_branch.is_empty_collection() => {
                let predicate = match predicate {
                    Some(p) => (*p).and(*cond),
                    None => *cond,
                };
                Ok((
                    Term::comprehension(*source, binder, Some(predicate), *then_branch),
                    true,
                ))
            }
            body => Ok((
                Term::For {
                    source,
                    binder,
                    predicate,
                    body: Box::new(body),
                },
                false,
            )),
        },
        other => Ok((other, false)),
    }
}

fn split_conditional(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
    let Term::If {
        cond,
        then_branch,
        else_branch,
    } = term
    else {
        return Ok((term, false));
    };

    match (*then_branch, *else_branch) {
        (then_branch @ Term::Empty(_), Term::Empty(_)) => Ok((then_branch, true)),
        (then_branch, else_branch @ Term::Empty(_)) => match then_branch {
            Term::Union(m, n) => Ok((
                Term::union_all(
                    Term::if_then_else((*cond).clone(), *m, else_branch.clone()),
                    Term::if_then_else(*cond, *n, else_branch),
                ),
                true,
            )),
            Term::If {
                cond: inner,
                then_branch: m,
                else_branch: inner_else,
            } if inner_else.is_empty_collection() => Ok((
                Term::if_then_else((*cond).and(*inner), *m, else_branch),
                true,
            )),
            then_branch => Ok((Term::if_then_else(*cond, then_branch, else_branch), false)),
        },
        (then_branch, else_branch) => {
            let empty = match &then_branch {
                Term::Empty(element) => Term::Empty(element.clone()),
                other => empty_like(other, env)?,
            };
            Ok((
                Term::union_all(
                    Term::if_then_else((*cond).clone(), then_branch, empty.clone()),
                    Term::if_then_else((*cond).not(), else_branch, empty),
                ),
                true,
            ))
        }
    }
}

/// Find the first conditional reachable from `value` through record fields
/// whose branches carry a collection. Returns its condition together with
/// `value` specialized to each branch.
fn split_carrying_conditional(value: &Term) -> Option<(Term, Term, Term)> {
    match value {
        Term::If {
            cond,
            then_branch,
            else_branch,
        } if !value.is_collection_form()
            && (then_branch.any(&Term::is_collection_form)
                || else_branch.any(&Term::is_collection_form)) =>
        {
            Some((
                (**cond).clone(),
                (**then_branch).clone(),
                (**else_branch).clone(),
            ))
        }
        Term::Record(fields) => fields.iter().enumerate().find_map(|(index, (_, field))| {
            let (cond, then_field, else_field) = split_carrying_conditional(field)?;
            let with_field = |replacement: Term| {
                let mut fields = fields.clone();
                fields[index].1 = replacement;
                Term::Record(fields)
            };
            Some((cond, with_field(then_field), with_field(else_field)))
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{DataType, RecordType, Type};
    use quarry_logical::term::{
        empty, for_each, for_where, if_then_else, lit, record, union, var, yield_,
    };

    fn table(name: &str) -> Term {
        Term::table(name, RecordType::new().with_field("Id", DataType::Int64))
    }

    fn row() -> Type {
        Type::Record(RecordType::new().with_field("Id", DataType::Int64))
    }

    #[test]
    fn test_split_two_sided_conditional() {
        let c = var("c");
        let q = if_then_else(c.clone(), table("A"), table("B"));
        let (result, changed) = normalize_guard(
            &mut TypeEnv::from_bindings([("c", Type::bool())]),
            q,
        )
        .unwrap();
        assert!(changed);
        assert_eq!(
            result,
            union(
                if_then_else(c.clone(), table("A"), empty(row())),
                if_then_else(c.not(), table("B"), empty(row())),
            )
        );
    }

    #[test]
    fn test_guard_merges_into_predicate() {
        let q = for_where(
            table("A"),
            "x",
            var("x").field("Id").gt(lit(0i64)),
            if_then_else(
                var("x").field("Id").lt(lit(10i64)),
                yield_(var("x")),
                empty(row()),
            ),
        );
        let result = GuardNormalization.apply(q).unwrap();
        assert!(result.changed);
        assert_eq!(
            result.term,
            for_where(
                table("A"),
                "x",
                var("x")
                    .field("Id")
                    .gt(lit(0i64))
                    .and(var("x").field("Id").lt(lit(10i64))),
                yield_(var("x")),
            )
        );
    }

    #[test]
    fn test_nested_guards_conjoin() {
        let q = if_then_else(
            lit(true),
            if_then_else(lit(false), table("A"), empty(row())),
            empty(row()),
        );
        let result = GuardNormalization.apply(q).unwrap();
        assert_eq!(
            result.term,
            if_then_else(lit(true).and(lit(false)), table("A"), empty(row()))
        );
    }

    #[test]
    fn test_guard_distributes_over_union() {
        let q = if_then_else(lit(true), union(table("A"), table("B")), empty(row()));
        let result = GuardNormalization.apply(q).unwrap();
        assert_eq!(
            result.term,
            union(
                if_then_else(lit(true), table("A"), empty(row())),
                if_then_else(lit(true), table("B"), empty(row())),
            )
        );
    }

    #[test]
    fn test_conditional_record_with_collections_splits_yield() {
        // for x in A do yield {id = x.Id, xs = if c then {ys = yield 1} else {ys = empty}}
        let ys = |v: Term| record([("ys", v)]);
        let q = for_each(
            table("A"),
            "x",
            yield_(record([
                ("id", var("x").field("Id")),
                (
                    "xs",
                    if_then_else(
                        var("x").field("Id").gt(lit(3i64)),
                        ys(yield_(lit(1i64))),
                        ys(empty(Type::int())),
                    ),
                ),
            ])),
        );
        let result = GuardNormalization.apply(q).unwrap();
        assert!(result.changed);

        let element = |v: Term| record([("id", var("x").field("Id")), ("xs", ys(v))]);
        let element_type = Type::Record(
            RecordType::new()
                .with_field("id", DataType::Int64)
                .with_field(
                    "xs",
                    Type::Record(
                        RecordType::new().with_field("ys", Type::collection(Type::int())),
                    ),
                ),
        );
        let cond = var("x").field("Id").gt(lit(3i64));
        assert_eq!(
            result.term,
            for_each(
                table("A"),
                "x",
                union(
                    if_then_else(
                        cond.clone(),
                        yield_(element(yield_(lit(1i64)))),
                        empty(element_type.clone()),
                    ),
                    if_then_else(
                        cond.not(),
                        yield_(element(empty(Type::int()))),
                        empty(element_type),
                    ),
                ),
            )
        );
    }

    #[test]
    fn test_base_conditional_untouched() {
        let q = for_each(
            table("A"),
            "x",
            yield_(if_then_else(lit(true), lit(1i64), lit(2i64))),
        );
        assert!(!GuardNormalization.apply(q).unwrap().changed);
    }
}
