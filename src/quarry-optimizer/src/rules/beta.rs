//! Beta reduction (R1).

use common_error::QuarryResult;
use quarry_logical::{substitute, Term};

use super::rule::{rewrite_bottom_up, RewriteRule, Transformed};

/// Beta reduction rule.
///
/// # Rewrites
///
/// - `(fun x -> b)(a)` becomes `b[x := a]` (capture-avoiding)
/// - `(if c then f else g)(a)` becomes `if c then f(a) else g(a)`
pub struct BetaReduction;

impl RewriteRule for BetaReduction {
    fn name(&self) -> &'static str {
        "BetaReduction"
    }

    fn description(&self) -> &'static str {
        "Substitute arguments into applied function bodies"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut |_, node| reduce(node))
    }
}

fn reduce(term: Term) -> QuarryResult<(Term, bool)> {
    let Term::Apply { func, arg } = term else {
        return Ok((term, false));
    };

    match *func {
        Term::Lambda { param, body, .. } => Ok((substitute(&param, &arg, *body)?, true)),
        Term::If {
            cond,
            then_branch,
            else_branch,
        } => Ok((
            Term::if_then_else(
                *cond,
                (*then_branch).apply((*arg).clone()),
                (*else_branch).apply(*arg),
            ),
            true,
        )),
        func => Ok((func.apply(*arg), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Type;
    use quarry_logical::alpha_equals;
    use quarry_logical::term::{apply, if_then_else, lambda, lit, var};

    #[test]
    fn test_beta() {
        let t = apply(
            lambda("x", Type::int(), var("x").add(lit(1i64))),
            lit(41i64),
        );
        let result = BetaReduction.apply(t).unwrap();
        assert!(result.changed);
        assert_eq!(result.term, lit(41i64).add(lit(1i64)));
    }

    #[test]
    fn test_curried_application_in_one_pass() {
        // ((fun a -> fun b -> a - b)(10))(3)
        let f = lambda(
            "a",
            Type::int(),
            lambda("b", Type::int(), var("a").sub(var("b"))),
        );
        let t = apply(apply(f, lit(10i64)), lit(3i64));

        // The inner redex is reduced first, exposing the outer one to the
        // same pass.
        let result = BetaReduction.apply(t).unwrap();
        assert!(result.changed);
        assert_eq!(result.term, lit(10i64).sub(lit(3i64)));
    }

    #[test]
    fn test_application_of_conditional() {
        let inc = lambda("x", Type::int(), var("x").add(lit(1i64)));
        let dec = lambda("x", Type::int(), var("x").sub(lit(1i64)));
        let t = apply(if_then_else(lit(true), inc.clone(), dec.clone()), lit(5i64));

        let result = BetaReduction.apply(t).unwrap();
        assert!(result.changed);
        assert!(alpha_equals(
            &result.term,
            &if_then_else(lit(true), apply(inc, lit(5i64)), apply(dec, lit(5i64)))
        ));
    }

    #[test]
    fn test_no_redex() {
        let result = BetaReduction.apply(var("f").apply(lit(1i64))).unwrap();
        assert!(!result.changed);
    }
}
