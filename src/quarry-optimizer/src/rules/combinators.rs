//! Collection combinators (R5).

use common_error::{QuarryError, QuarryResult};
use quarry_logical::{canonical_key, Term, TypeEnv};

use super::rule::{element_type_under, rewrite_bottom_up, RewriteRule, Transformed};

/// Collection combinator rule.
///
/// # Rewrites
///
/// - `for x in empty do N` becomes `empty`
/// - `for x in (A union B) where p do N` becomes
///   `(for x in A where p do N) union (for x in B where p do N)`
/// - `for x in L where p do empty` becomes `empty`
/// - `for x in L where p do (M union N)` becomes
///   `(for x in L where p do M) union (for x in L where p do N)`
/// - `empty union M` and `M union empty` become `M`
/// - `A union (B union C)` becomes `(A union B) union C`
/// - the branches of a left-associated union are ordered by
///   [`canonical_key`], so the order in which unions were distributed does
///   not show in the normal form
pub struct CollectionCombinators;

impl RewriteRule for CollectionCombinators {
    fn name(&self) -> &'static str {
        "CollectionCombinators"
    }

    fn description(&self) -> &'static str {
        "Distribute comprehensions over union and eliminate empty collections"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut simplify)
    }
}

fn simplify(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
    match term {
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            let predicate = predicate.map(|p| *p);
            match (*source, *body) {
                (Term::Empty(element), body) => {
                    let result = element_type_under(&binder, element, &body, env)?;
                    Ok((Term::Empty(result), true))
                }
                (_, Term::Empty(element)) => Ok((Term::Empty(element), true)),
                (Term::Union(a, b), body) => Ok((
                    Term::union_all(
                        Term::comprehension(*a, binder.clone(), predicate.clone(), body.clone()),
                        Term::comprehension(*b, binder, predicate, body),
                    ),
                    true,
                )),
                (source, Term::Union(m, n)) => Ok((
                    Term::union_all(
                        Term::comprehension(source.clone(), binder.clone(), predicate.clone(), *m),
                        Term::comprehension(source, binder, predicate, *n),
                    ),
                    true,
                )),
                (source, body) => Ok((Term::comprehension(source, binder, predicate, body), false)),
            }
        }
        Term::Union(left, right) => match (*left, *right) {
            (Term::Empty(_), m) | (m, Term::Empty(_)) => Ok((m, true)),
            (a, Term::Union(b, c)) => Ok((Term::union_all(Term::union_all(a, *b), *c), true)),
            (left, right) => order_branches(Term::union_all(left, right)),
        },
        other => Ok((other, false)),
    }
}

/// Reorder the branches of a union by canonical key. Bag union is
/// commutative, so this never changes the result.
fn order_branches(union: Term) -> QuarryResult<(Term, bool)> {
    let keys: Vec<String> = branches(&union).into_iter().map(canonical_key).collect();
    if keys.windows(2).all(|w| w[0] <= w[1]) {
        return Ok((union, false));
    }

    let mut owned = Vec::with_capacity(keys.len());
    into_branches(union, &mut owned);
    let mut keyed: Vec<(String, Term)> = keys.into_iter().zip(owned).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    keyed
        .into_iter()
        .map(|(_, t)| t)
        .reduce(Term::union_all)
        .map(|t| (t, true))
        .ok_or_else(|| QuarryError::invariant("union without branches"))
}

fn branches(term: &Term) -> Vec<&Term> {
    match term {
        Term::Union(l, r) => {
            let mut out = branches(l);
            out.extend(branches(r));
            out
        }
        other => vec![other],
    }
}

fn into_branches(term: Term, out: &mut Vec<Term>) {
    match term {
        Term::Union(l, r) => {
            into_branches(*l, out);
            into_branches(*r, out);
        }
        other => out.push(other),
    }
}
