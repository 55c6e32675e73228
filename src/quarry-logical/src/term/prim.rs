//! Primitive operators.

use std::fmt;

use quarry_core::DataType;
use serde::{Deserialize, Serialize};

/// Whether evaluating a host function can be observed outside the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Deterministic and side-effect free.
    Pure,
    /// Performs I/O, mutation, or is otherwise not safe to reorder.
    Effectful,
}

/// A named function supplied by the host, with a declared signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostFunction {
    /// Function name.
    pub name: String,
    /// Parameter types.
    pub params: Vec<DataType>,
    /// Result type.
    pub returns: DataType,
    /// Declared effect.
    pub effect: Effect,
}

impl HostFunction {
    /// Declare a pure host function.
    pub fn pure(name: impl Into<String>, params: Vec<DataType>, returns: DataType) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            effect: Effect::Pure,
        }
    }

    /// Declare an effectful host function.
    pub fn effectful(name: impl Into<String>, params: Vec<DataType>, returns: DataType) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            effect: Effect::Effectful,
        }
    }

    /// Whether the function is declared pure.
    pub fn is_pure(&self) -> bool {
        self.effect == Effect::Pure
    }
}

/// Primitive operators over base values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimOp {
    // Arithmetic operators
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Subtract,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Modulo (%)
    Modulo,
    /// Arithmetic negation (unary -)
    Negate,

    // Comparison operators
    /// Equality (=)
    Eq,
    /// Inequality (<>)
    NotEq,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    LtEq,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    GtEq,

    // Logical operators
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Logical NOT
    Not,

    // String operators
    /// String concatenation
    Concat,

    /// A call to a host function.
    Call(HostFunction),
}

impl PrimOp {
    /// Check if this is an arithmetic operator.
    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo | Self::Negate
        )
    }

    /// Check if this is a comparison operator.
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// Check if this is a logical operator.
    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    /// Number of operands.
    pub fn arity(&self) -> usize {
        match self {
            Self::Negate | Self::Not => 1,
            Self::Call(func) => func.params.len(),
            _ => 2,
        }
    }

    /// Operator symbol (or function name).
    pub fn symbol(&self) -> &str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Negate => "-",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Concat => "||",
            Self::Call(func) => &func.name,
        }
    }

    /// Human-readable description of the operand types this operator accepts.
    pub fn signature(&self) -> String {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo => {
                "two numeric operands".to_string()
            }
            Self::Negate => "one numeric operand".to_string(),
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => {
                "two comparable operands".to_string()
            }
            Self::And | Self::Or => "two Bool operands".to_string(),
            Self::Not => "one Bool operand".to_string(),
            Self::Concat => "two String operands".to_string(),
            Self::Call(func) => {
                let params = func
                    .params
                    .iter()
                    .map(DataType::display_name)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            }
        }
    }

    /// Get the result type of this operator given operand types.
    ///
    /// Returns `None` if the operation is not valid for the given types.
    pub fn result_type(&self, args: &[DataType]) -> Option<DataType> {
        if args.len() != self.arity() {
            return None;
        }

        match self {
            // Arithmetic: numeric types, result is widest type
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo => {
                let (l, r) = (args[0], args[1]);
                if l.is_numeric() && r.is_numeric() {
                    l.common_supertype(&r)
                } else {
                    None
                }
            }
            Self::Negate => args[0].is_numeric().then_some(args[0]),

            // Comparison: compatible types, result is Bool
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => args[0]
                .common_supertype(&args[1])
                .map(|_| DataType::Bool),

            // Logical: all operands must be Bool
            Self::And | Self::Or | Self::Not => args
                .iter()
                .all(|a| *a == DataType::Bool)
                .then_some(DataType::Bool),

            Self::Concat => (args[0].is_string() && args[1].is_string()).then_some(DataType::String),

            Self::Call(func) => args
                .iter()
                .zip(&func.params)
                .all(|(a, p)| a.can_coerce_to(p))
                .then_some(func.returns),
        }
    }
}

impl fmt::Display for PrimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_result_type() {
        assert_eq!(
            PrimOp::Add.result_type(&[DataType::Int64, DataType::Int64]),
            Some(DataType::Int64)
        );
        assert_eq!(
            PrimOp::Multiply.result_type(&[DataType::Int64, DataType::Float64]),
            Some(DataType::Float64)
        );
        assert_eq!(
            PrimOp::Add.result_type(&[DataType::String, DataType::Int64]),
            None
        );
    }

    #[test]
    fn test_comparison_result_type() {
        assert_eq!(
            PrimOp::Lt.result_type(&[DataType::Int64, DataType::Float64]),
            Some(DataType::Bool)
        );
        assert_eq!(
            PrimOp::Eq.result_type(&[DataType::String, DataType::Int64]),
            None
        );
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(PrimOp::Not.result_type(&[DataType::Bool, DataType::Bool]), None);
        assert_eq!(PrimOp::Not.result_type(&[DataType::Bool]), Some(DataType::Bool));
    }

    #[test]
    fn test_host_function() {
        let lower = PrimOp::Call(HostFunction::pure(
            "lower",
            vec![DataType::String],
            DataType::String,
        ));
        assert_eq!(lower.arity(), 1);
        assert_eq!(lower.symbol(), "lower");
        assert_eq!(lower.signature(), "(String)");
        assert_eq!(lower.result_type(&[DataType::String]), Some(DataType::String));
        assert_eq!(lower.result_type(&[DataType::Int64]), None);
    }

    #[test]
    fn test_classification() {
        assert!(PrimOp::Modulo.is_arithmetic());
        assert!(PrimOp::GtEq.is_comparison());
        assert!(PrimOp::Not.is_logical());
        assert!(!PrimOp::Concat.is_logical());
    }
}
