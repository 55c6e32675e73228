//! Runtime values.

use std::fmt;

use common_error::{QuarryError, QuarryResult};
use quarry_core::Value;
use quarry_logical::Term;

/// A variable environment, innermost binding last.
pub type Env = Vec<(String, Datum)>;

/// A value produced while evaluating a term.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// A base constant.
    Base(Value),
    /// A record with ordered fields.
    Record(Vec<(String, Datum)>),
    /// A bag (multiset). Element order carries no meaning.
    Bag(Vec<Datum>),
    /// A function value.
    Closure(Closure),
}

/// A function together with the environment it was created in.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub param: String,
    pub body: Term,
    pub env: Env,
}

impl Datum {
    /// Create a record datum.
    pub fn record<L: Into<String>>(fields: impl IntoIterator<Item = (L, Datum)>) -> Self {
        Self::Record(fields.into_iter().map(|(l, d)| (l.into(), d)).collect())
    }

    /// The base value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Base(v) => Some(v),
            _ => None,
        }
    }

    /// The boolean, or an `ExecutionError`.
    pub fn to_bool(&self) -> QuarryResult<bool> {
        self.as_value()
            .and_then(Value::as_bool)
            .ok_or_else(|| QuarryError::execution(format!("expected a boolean, got {self}")))
    }

    /// The bag elements, or an `ExecutionError`.
    pub fn into_bag(self) -> QuarryResult<Vec<Self>> {
        match self {
            Self::Bag(items) => Ok(items),
            other => Err(QuarryError::execution(format!(
                "expected a collection, got {other}"
            ))),
        }
    }

    /// Field of a record, or an `ExecutionError`.
    pub fn field(&self, label: &str) -> QuarryResult<&Self> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, d)| d)
                .ok_or_else(|| QuarryError::execution(format!("record has no field `{label}`"))),
            other => Err(QuarryError::execution(format!(
                "cannot project `{label}` from {other}"
            ))),
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Self::Base(value)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(v) => write!(f, "{v}"),
            Self::Record(fields) => {
                write!(f, "{{")?;
                for (i, (label, d)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label} = {d}")?;
                }
                write!(f, "}}")
            }
            Self::Bag(items) => {
                write!(f, "[")?;
                for (i, d) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                write!(f, "]")
            }
            Self::Closure(c) => write!(f, "<fun {}>", c.param),
        }
    }
}

/// Multiset equality of two bags, applied recursively to nested bags.
pub fn bag_equals(left: &[Datum], right: &[Datum]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut used = vec![false; right.len()];
    left.iter().all(|l| {
        let found = right
            .iter()
            .enumerate()
            .find(|(i, r)| !used[*i] && datum_equals(l, r))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Equality treating every nested bag as a multiset.
pub fn datum_equals(left: &Datum, right: &Datum) -> bool {
    match (left, right) {
        (Datum::Bag(l), Datum::Bag(r)) => bag_equals(l, r),
        (Datum::Record(l), Datum::Record(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .zip(r)
                    .all(|((ll, ld), (rl, rd))| ll == rl && datum_equals(ld, rd))
        }
        (l, r) => l == r,
    }
}
