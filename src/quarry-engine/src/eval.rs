//! Evaluation of built-in primitive operators.

use std::cmp::Ordering;

use common_error::{exec_err, QuarryError, QuarryResult};
use quarry_core::Value;
use quarry_logical::PrimOp;

/// Evaluator for the built-in operators.
///
/// Integer arithmetic is checked: overflow and division by zero are
/// `ExecutionError`s. Mixed integer/float operands are widened to float.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimEvaluator;

impl PrimEvaluator {
    /// Create a new primitive evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Apply a built-in operator to its evaluated operands.
    pub fn evaluate(&self, op: &PrimOp, args: &[Value]) -> QuarryResult<Value> {
        match (op, args) {
            (PrimOp::Not, [v]) => self.eval_not(v),
            (PrimOp::Negate, [v]) => self.eval_negate(v),
            (PrimOp::Call(func), _) => Err(QuarryError::execution(format!(
                "host function `{}` is not available",
                func.name
            ))),

            // Arithmetic operators
            (PrimOp::Add | PrimOp::Subtract | PrimOp::Multiply, [l, r]) => {
                self.eval_arithmetic(op, l, r)
            }
            (PrimOp::Divide | PrimOp::Modulo, [l, r]) => self.eval_division(op, l, r),

            // Comparison operators
            (op, [l, r]) if op.is_comparison() => self.eval_comparison(op, l, r),

            // Logical operators
            (PrimOp::And, [l, r]) => Ok(Value::Bool(self.bool_operand(l)? && self.bool_operand(r)?)),
            (PrimOp::Or, [l, r]) => Ok(Value::Bool(self.bool_operand(l)? || self.bool_operand(r)?)),

            // String operators
            (PrimOp::Concat, [Value::String(l), Value::String(r)]) => {
                Ok(Value::String(format!("{l}{r}")))
            }

            _ => Err(QuarryError::execution(format!(
                "operator `{op}` cannot be applied to {} operand(s)",
                args.len()
            ))),
        }
    }

    fn bool_operand(&self, value: &Value) -> QuarryResult<bool> {
        value
            .as_bool()
            .ok_or_else(|| QuarryError::execution(format!("expected Bool, got {}", value.type_name())))
    }

    fn eval_not(&self, value: &Value) -> QuarryResult<Value> {
        Ok(Value::Bool(!self.bool_operand(value)?))
    }

    fn eval_negate(&self, value: &Value) -> QuarryResult<Value> {
        match value {
            Value::Int64(i) => i
                .checked_neg()
                .map(Value::Int64)
                .ok_or_else(|| QuarryError::execution("integer overflow in negation")),
            Value::Float64(f) => Ok(Value::Float64(-f)),
            other => exec_err!("cannot negate {}", other.type_name()),
        }
    }

    /// Evaluate `+`, `-` and `*`.
    fn eval_arithmetic(&self, op: &PrimOp, left: &Value, right: &Value) -> QuarryResult<Value> {
        if let (Value::Int64(l), Value::Int64(r)) = (left, right) {
            let result = match op {
                PrimOp::Add => l.checked_add(*r),
                PrimOp::Subtract => l.checked_sub(*r),
                _ => l.checked_mul(*r),
            };
            return result
                .map(Value::Int64)
                .ok_or_else(|| QuarryError::execution(format!("integer overflow in `{op}`")));
        }

        let (l, r) = self.float_operands(op, left, right)?;
        Ok(Value::Float64(match op {
            PrimOp::Add => l + r,
            PrimOp::Subtract => l - r,
            _ => l * r,
        }))
    }

    /// Evaluate `/` and `%`.
    fn eval_division(&self, op: &PrimOp, left: &Value, right: &Value) -> QuarryResult<Value> {
        if let (Value::Int64(l), Value::Int64(r)) = (left, right) {
            if *r == 0 {
                exec_err!("division by zero");
            }
            let result = match op {
                PrimOp::Divide => l.checked_div(*r),
                _ => l.checked_rem(*r),
            };
            return result
                .map(Value::Int64)
                .ok_or_else(|| QuarryError::execution(format!("integer overflow in `{op}`")));
        }

        let (l, r) = self.float_operands(op, left, right)?;
        if r == 0.0 {
            exec_err!("division by zero");
        }
        Ok(Value::Float64(match op {
            PrimOp::Divide => l / r,
            _ => l % r,
        }))
    }

    fn float_operands(&self, op: &PrimOp, left: &Value, right: &Value) -> QuarryResult<(f64, f64)> {
        match (left.as_float64(), right.as_float64()) {
            (Some(l), Some(r)) if left.data_type().is_numeric() && right.data_type().is_numeric() => {
                Ok((l, r))
            }
            _ => exec_err!(
                "`{op}` requires numeric operands, got {} and {}",
                left.type_name(),
                right.type_name()
            ),
        }
    }

    fn eval_comparison(&self, op: &PrimOp, left: &Value, right: &Value) -> QuarryResult<Value> {
        let ordering = match (left, right) {
            (Value::Int64(l), Value::Int64(r)) => Some(l.cmp(r)),
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            _ => {
                let (l, r) = self.float_operands(op, left, right)?;
                l.partial_cmp(&r)
            }
        };

        // NaN compares unequal to everything
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(matches!(op, PrimOp::NotEq)));
        };

        Ok(Value::Bool(match op {
            PrimOp::Eq => ordering == Ordering::Equal,
            PrimOp::NotEq => ordering != Ordering::Equal,
            PrimOp::Lt => ordering == Ordering::Less,
            PrimOp::LtEq => ordering != Ordering::Greater,
            PrimOp::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(op: PrimOp, args: &[Value]) -> QuarryResult<Value> {
        PrimEvaluator::new().evaluate(&op, args)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            eval(PrimOp::Add, &[Value::Int64(2), Value::Int64(3)]).unwrap(),
            Value::Int64(5)
        );
        assert_eq!(
            eval(PrimOp::Multiply, &[Value::Int64(2), Value::Float64(1.5)]).unwrap(),
            Value::Float64(3.0)
        );
        assert_eq!(
            eval(PrimOp::Modulo, &[Value::Int64(7), Value::Int64(2)]).unwrap(),
            Value::Int64(1)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval(PrimOp::Divide, &[Value::Int64(1), Value::Int64(0)]).unwrap_err();
        assert!(matches!(err, QuarryError::ExecutionError(_)));
        assert!(eval(PrimOp::Modulo, &[Value::Float64(1.0), Value::Float64(0.0)]).is_err());
    }

    #[test]
    fn test_overflow() {
        assert!(eval(PrimOp::Add, &[Value::Int64(i64::MAX), Value::Int64(1)]).is_err());
        assert!(eval(PrimOp::Negate, &[Value::Int64(i64::MIN)]).is_err());
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            eval(PrimOp::Lt, &[Value::Int64(1), Value::Float64(1.5)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(PrimOp::GtEq, &[Value::from("b"), Value::from("a")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(PrimOp::NotEq, &[Value::Bool(true), Value::Bool(false)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_logical_and_string() {
        assert_eq!(
            eval(PrimOp::And, &[Value::Bool(true), Value::Bool(false)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval(PrimOp::Not, &[Value::Bool(false)]).unwrap(), Value::Bool(true));
        assert_eq!(
            eval(PrimOp::Concat, &[Value::from("a"), Value::from("b")]).unwrap(),
            Value::from("ab")
        );
        assert!(eval(PrimOp::And, &[Value::Int64(1), Value::Bool(true)]).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integer_arithmetic_is_checked(l in any::<i64>(), r in any::<i64>()) {
                let sum = eval(PrimOp::Add, &[Value::Int64(l), Value::Int64(r)]);
                match l.checked_add(r) {
                    Some(expected) => prop_assert_eq!(sum.unwrap(), Value::Int64(expected)),
                    None => prop_assert!(sum.is_err()),
                }

                let quotient = eval(PrimOp::Divide, &[Value::Int64(l), Value::Int64(r)]);
                match l.checked_div(r) {
                    Some(expected) => prop_assert_eq!(quotient.unwrap(), Value::Int64(expected)),
                    None => prop_assert!(quotient.is_err()),
                }
            }

            #[test]
            fn comparisons_agree_with_ordering(l in any::<i64>(), r in any::<i64>()) {
                let lt = eval(PrimOp::Lt, &[Value::Int64(l), Value::Int64(r)]).unwrap();
                let gt_eq = eval(PrimOp::GtEq, &[Value::Int64(l), Value::Int64(r)]).unwrap();
                prop_assert_eq!(lt, Value::Bool(l < r));
                prop_assert_eq!(gt_eq, Value::Bool(l >= r));
            }
        }
    }
}
