//! Positions inside a term tree.

use std::fmt;

/// Path from the root of a term to one of its sub-terms.
///
/// Rendered as `$` for the root and `$.source.body.args[1]` for nested
/// positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    segments: Vec<String>,
}

impl Location {
    /// The root position.
    pub fn root() -> Self {
        Self::default()
    }

    /// The position of a named child of this position.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// The position of the `index`-th argument of this position.
    #[must_use]
    pub fn arg(&self, index: usize) -> Self {
        self.child(format!("args[{index}]"))
    }

    /// The position of a record field of this position.
    #[must_use]
    pub fn field(&self, label: &str) -> Self {
        self.child(format!("fields[{label}]"))
    }

    /// Path segments from the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of steps from the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root position.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::root().to_string(), "$");
        let loc = Location::root().child("body").arg(1).field("name");
        assert_eq!(loc.to_string(), "$.body.args[1].fields[name]");
        assert_eq!(loc.depth(), 3);
        assert!(!loc.is_root());
    }
}
