//! Constant folding optimization rule.
//!
//! Evaluate constant expressions at normalization time.

use std::cmp::Ordering;

use common_error::QuarryResult;
use quarry_core::Value;
use quarry_logical::{PrimOp, Term, TypeEnv};

use super::rule::{empty_for, rewrite_bottom_up, RewriteRule, Transformed};

/// Constant folding rule.
///
/// # Rewrites
///
/// - primitives over literals are evaluated (never a division by zero or an
///   overflowing integer operation, and never a host function call)
/// - `x AND true`, `x OR false` and friends are simplified
/// - `NOT NOT x` becomes `x`
/// - `a AND (b AND c)` becomes `(a AND b) AND c`, likewise for `OR`
/// - `if true then M else N` becomes `M`
/// - `for x in L where true do N` drops the predicate, and
///   `for x in L where false do N` becomes `empty`
pub struct ConstantFolding;

impl RewriteRule for ConstantFolding {
    fn name(&self) -> &'static str {
        "ConstantFolding"
    }

    fn description(&self) -> &'static str {
        "Evaluate constant expressions at normalization time"
    }

    fn apply(&self, term: Term) -> QuarryResult<Transformed> {
        rewrite_bottom_up(term, &mut fold_constants)
    }
}

fn fold_constants(env: &mut TypeEnv, term: Term) -> QuarryResult<(Term, bool)> {
    match term {
        Term::Prim { op, args } => Ok(fold_prim(op, args)),

        Term::If {
            cond,
            then_branch,
            else_branch,
        } => match cond.as_bool() {
            Some(true) => Ok((*then_branch, true)),
            Some(false) => Ok((*else_branch, true)),
            None => Ok((
                Term::If {
                    cond,
                    then_branch,
                    else_branch,
                },
                false,
            )),
        },

        Term::For {
            source,
            binder,
            predicate,
            body,
        } => match predicate.as_deref().and_then(Term::as_bool) {
            // Predicate is always true, drop it
            Some(true) => Ok((Term::comprehension(*source, binder, None, *body), true)),
            // Predicate is always false, nothing is produced
            Some(false) => Ok((empty_for(&source, &binder, &body, env)?, true)),
            None => Ok((
                Term::For {
                    source,
                    binder,
                    predicate,
                    body,
                },
                false,
            )),
        },

        other => Ok((other, false)),
    }
}

/// Fold a primitive whose operands are already folded.
fn fold_prim(op: PrimOp, args: Vec<Term>) -> (Term, bool) {
    let literals: Option<Vec<Value>> = args
        .iter()
        .map(|a| match a {
            Term::Const(v) => Some(v.clone()),
            _ => None,
        })
        .collect();

    if let Some(result) = literals.and_then(|values| evaluate(&op, &values)) {
        return (Term::Const(result), true);
    }

    match op {
        PrimOp::And | PrimOp::Or => match <[Term; 2]>::try_from(args) {
            Ok([left, right]) => simplify_connective(op, left, right),
            Err(args) => (Term::prim(op, args), false),
        },
        PrimOp::Not => match <[Term; 1]>::try_from(args) {
            Ok([Term::Prim {
                op: PrimOp::Not,
                args: mut inner,
            }]) if inner.len() == 1 => (inner.remove(0), true),
            Ok([operand]) => (operand.not(), false),
            Err(args) => (Term::prim(PrimOp::Not, args), false),
        },
        op => (Term::prim(op, args), false),
    }
}

/// Unit and zero elements of `AND`/`OR`, then left association.
fn simplify_connective(op: PrimOp, left: Term, right: Term) -> (Term, bool) {
    let is_and = op == PrimOp::And;

    // true AND x = x, false AND x = false, false OR x = x, true OR x = true
    if let Some(b) = left.as_bool() {
        return (if b == is_and { right } else { Term::constant(b) }, true);
    }
    if let Some(b) = right.as_bool() {
        return (if b == is_and { left } else { Term::constant(b) }, true);
    }

    match right {
        Term::Prim { op: inner, args } if inner == op => match <[Term; 2]>::try_from(args) {
            Ok([b, c]) => (
                Term::prim(op.clone(), vec![Term::prim(op, vec![left, b]), c]),
                true,
            ),
            Err(args) => (Term::prim(op, vec![left, Term::prim(inner, args)]), false),
        },
        right => (Term::prim(op, vec![left, right]), false),
    }
}

/// Evaluate an operator on literal operands.
fn evaluate(op: &PrimOp, args: &[Value]) -> Option<Value> {
    match (op, args) {
        (PrimOp::Not, [Value::Bool(b)]) => Some(Value::Bool(!b)),
        (PrimOp::Negate, [Value::Int64(i)]) => i.checked_neg().map(Value::Int64),
        (PrimOp::Negate, [Value::Float64(f)]) => Some(Value::Float64(-f)),
        // Host functions are opaque at normalization time
        (PrimOp::Call(_), _) => None,
        (op, [left, right]) => evaluate_binary(left, op, right),
        _ => None,
    }
}

/// Evaluate a binary operation on two literal values.
fn evaluate_binary(left: &Value, op: &PrimOp, right: &Value) -> Option<Value> {
    match (left, right, op) {
        // Integer arithmetic
        (Value::Int64(l), Value::Int64(r), PrimOp::Add) => l.checked_add(*r).map(Value::Int64),
        (Value::Int64(l), Value::Int64(r), PrimOp::Subtract) => {
            l.checked_sub(*r).map(Value::Int64)
        }
        (Value::Int64(l), Value::Int64(r), PrimOp::Multiply) => {
            l.checked_mul(*r).map(Value::Int64)
        }
        (Value::Int64(l), Value::Int64(r), PrimOp::Divide) => l.checked_div(*r).map(Value::Int64),
        (Value::Int64(l), Value::Int64(r), PrimOp::Modulo) => l.checked_rem(*r).map(Value::Int64),

        // Same-type comparisons
        (Value::Int64(l), Value::Int64(r), op) if op.is_comparison() => {
            Some(Value::Bool(compare(op, l.cmp(r))))
        }
        (Value::String(l), Value::String(r), op) if op.is_comparison() => {
            Some(Value::Bool(compare(op, l.cmp(r))))
        }
        (Value::Bool(l), Value::Bool(r), op) if op.is_comparison() => {
            Some(Value::Bool(compare(op, l.cmp(r))))
        }

        // Boolean logic
        (Value::Bool(l), Value::Bool(r), PrimOp::And) => Some(Value::Bool(*l && *r)),
        (Value::Bool(l), Value::Bool(r), PrimOp::Or) => Some(Value::Bool(*l || *r)),

        // String concatenation
        (Value::String(l), Value::String(r), PrimOp::Concat) => {
            Some(Value::String(format!("{l}{r}")))
        }

        // Float arithmetic and comparison, widening integers
        (l, r, op) if l.data_type().is_numeric() && r.data_type().is_numeric() => {
            let (l, r) = (l.as_float64()?, r.as_float64()?);
            match op {
                PrimOp::Add => Some(Value::Float64(l + r)),
                PrimOp::Subtract => Some(Value::Float64(l - r)),
                PrimOp::Multiply => Some(Value::Float64(l * r)),
                PrimOp::Divide if r != 0.0 => Some(Value::Float64(l / r)),
                PrimOp::Modulo if r != 0.0 => Some(Value::Float64(l % r)),
                op if op.is_comparison() => {
                    l.partial_cmp(&r).map(|ord| Value::Bool(compare(op, ord)))
                }
                _ => None,
            }
        }

        _ => None,
    }
}

fn compare(op: &PrimOp, ord: Ordering) -> bool {
    match op {
        PrimOp::Eq => ord == Ordering::Equal,
        PrimOp::NotEq => ord != Ordering::Equal,
        PrimOp::Lt => ord == Ordering::Less,
        PrimOp::LtEq => ord != Ordering::Greater,
        PrimOp::Gt => ord == Ordering::Greater,
        PrimOp::GtEq => ord != Ordering::Less,
        _ => false,
    }
}
