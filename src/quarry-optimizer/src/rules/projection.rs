//! Projection reduction (R2).

use common_error::{QuarryError, QuarryResult};
use quarry_logical::Term;

use super::rule::{rewrite_bottom_up, RewriteRule, Transformed};

/// Projection reduction rule.
///
/// # Rewrites
///
/// - `{l1 = t1, ..., ln = tn}.li` becomes `ti`
/// - `(if c then r else s).l` becomes `if c then r.l else s.l`
pub struct ProjectionReduction;

impl RewriteRule for ProjectionReduction {
    fn name(&self) -> &'static str {
        "ProjectionReduction"
    }

    fn description(&self) -> &'static str {
        "Select fields out of record literals"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut |_, node| reduce(node))
    }
}

fn reduce(term: Term) -> QuarryResult<(Term, bool)> {
    let Term::Project { term: inner, label } = term else {
        return Ok((term, false));
    };

    match *inner {
        Term::Record(fields) => fields
            .into_iter()
            .find(|(l, _)| *l == label)
            .map(|(_, t)| (t, true))
            .ok_or_else(|| {
                QuarryError::invariant(format!("projection of missing field `{label}`"))
            }),
        Term::If {
            cond,
            then_branch,
            else_branch,
        } => Ok((
            Term::if_then_else(
                *cond,
                (*then_branch).field(label.clone()),
                (*else_branch).field(label),
            ),
            true,
        )),
        inner => Ok((inner.field(label), false)),
    }
}
