//! Typing environments.

use quarry_core::Type;

/// Variables in scope and their types, innermost last.
///
/// Lookups search from the innermost binding outwards, so an inner binder
/// shadows an outer one of the same name.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    bindings: Vec<(String, Type)>,
}

impl TypeEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment from `(name, type)` pairs, outermost first.
    pub fn from_bindings<S: Into<String>>(bindings: impl IntoIterator<Item = (S, Type)>) -> Self {
        Self {
            bindings: bindings.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Bring a variable into scope.
    pub fn push(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.push((name.into(), ty));
    }

    /// Drop the innermost binding.
    pub fn pop(&mut self) {
        self.bindings.pop();
    }

    /// The type of the innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Number of bindings in scope.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is in scope.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
