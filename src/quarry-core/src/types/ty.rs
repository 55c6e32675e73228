//! Types of terms.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DataType;

/// The type of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A base type.
    Base(DataType),
    /// A record with labelled fields.
    Record(RecordType),
    /// A function from a parameter type to a result type.
    Function(Box<Type>, Box<Type>),
    /// A bag of elements of the given type.
    Collection(Box<Type>),
}

impl Type {
    /// `Bool`.
    pub const fn bool() -> Self {
        Self::Base(DataType::Bool)
    }

    /// `Int64`.
    pub const fn int() -> Self {
        Self::Base(DataType::Int64)
    }

    /// `Float64`.
    pub const fn float() -> Self {
        Self::Base(DataType::Float64)
    }

    /// `String`.
    pub const fn string() -> Self {
        Self::Base(DataType::String)
    }

    /// A function type.
    pub fn function(param: Self, result: Self) -> Self {
        Self::Function(Box::new(param), Box::new(result))
    }

    /// A collection type.
    pub fn collection(element: Self) -> Self {
        Self::Collection(Box::new(element))
    }

    /// The base type, if this is one.
    pub const fn as_base(&self) -> Option<DataType> {
        match self {
            Self::Base(dt) => Some(*dt),
            _ => None,
        }
    }

    /// The record type, if this is one.
    pub const fn as_record(&self) -> Option<&RecordType> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The element type, if this is a collection.
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Collection(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is a collection type.
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// Whether a collection type occurs anywhere inside this type.
    ///
    /// A query whose element type contains a collection cannot be flattened
    /// into a single comprehension.
    pub fn contains_collection(&self) -> bool {
        match self {
            Self::Base(_) => false,
            Self::Collection(_) => true,
            Self::Record(r) => r.fields().iter().any(|(_, t)| t.contains_collection()),
            Self::Function(p, r) => p.contains_collection() || r.contains_collection(),
        }
    }

    /// Whether values of this type can flow into a position expecting
    /// `target` (identity, or integer widening on base types).
    pub fn can_coerce_to(&self, target: &Self) -> bool {
        match (self, target) {
            (Self::Base(a), Self::Base(b)) => a.can_coerce_to(b),
            _ => self == target,
        }
    }
}

impl From<DataType> for Type {
    fn from(dt: DataType) -> Self {
        Self::Base(dt)
    }
}

impl From<RecordType> for Type {
    fn from(r: RecordType) -> Self {
        Self::Record(r)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(dt) => write!(f, "{dt}"),
            Self::Record(r) => write!(f, "{r}"),
            Self::Function(p, r) => write!(f, "({p} -> {r})"),
            Self::Collection(e) => write!(f, "Collection<{e}>"),
        }
    }
}

/// An ordered list of labelled field types.
///
/// Labels are unique. Two record types are equal only if they list the same
/// labels with the same types in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    fields: Vec<(String, Type)>,
}

impl RecordType {
    /// Create an empty record type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. A later field with an existing label replaces the
    /// earlier one in place.
    #[must_use]
    pub fn with_field(mut self, label: impl Into<String>, ty: impl Into<Type>) -> Self {
        let label = label.into();
        let ty = ty.into();
        match self.fields.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = ty,
            None => self.fields.push((label, ty)),
        }
        self
    }

    /// Build a record type from `(label, type)` pairs.
    pub fn from_fields<L, T>(fields: impl IntoIterator<Item = (L, T)>) -> Self
    where
        L: Into<String>,
        T: Into<Type>,
    {
        fields
            .into_iter()
            .fold(Self::new(), |acc, (l, t)| acc.with_field(l, t))
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[(String, Type)] {
        &self.fields
    }

    /// Look up the type of a field.
    pub fn field(&self, label: &str) -> Option<&Type> {
        self.fields.iter().find(|(l, _)| l == label).map(|(_, t)| t)
    }

    /// The labels in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(l, _)| l.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether no label occurs twice.
    pub fn has_unique_labels(&self) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        self.labels().all(|label| seen.insert(label))
    }

    /// Whether every field has a base type.
    pub fn is_flat(&self) -> bool {
        self.fields.iter().all(|(_, t)| matches!(t, Type::Base(_)))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (label, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{label}: {ty}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> RecordType {
        RecordType::new()
            .with_field("Name", DataType::String)
            .with_field("Age", DataType::Int64)
    }

    #[test]
    fn test_record_lookup() {
        let row = person();
        assert_eq!(row.field("Age"), Some(&Type::int()));
        assert_eq!(row.field("Height"), None);
        assert_eq!(row.labels().collect::<Vec<_>>(), vec!["Name", "Age"]);
        assert!(row.is_flat());
    }

    #[test]
    fn test_duplicate_label_replaces() {
        let row = person().with_field("Age", DataType::Float64);
        assert_eq!(row.len(), 2);
        assert_eq!(row.field("Age"), Some(&Type::float()));
    }

    #[test]
    fn test_contains_collection() {
        let flat = Type::collection(Type::Record(person()));
        assert!(!flat.element().unwrap().contains_collection());

        let nested = RecordType::new()
            .with_field("dept", DataType::String)
            .with_field("people", Type::collection(Type::Record(person())));
        assert!(Type::Record(nested).contains_collection());
    }

    #[test]
    fn test_type_display() {
        let ty = Type::function(Type::int(), Type::collection(Type::Record(person())));
        assert_eq!(
            ty.to_string(),
            "(Int64 -> Collection<{Name: String, Age: Int64}>)"
        );
    }
}
