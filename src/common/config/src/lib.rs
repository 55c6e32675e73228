//! Configuration management for Quarry.
//!
//! Provides the knobs for normalization, splice-time stage validation and
//! flattening. Every section has a default and round-trips through JSON.

use std::collections::BTreeSet;

use common_error::QuarryResult;
use serde::{Deserialize, Serialize};

/// Global Quarry configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// Normalizer configuration.
    pub normalizer: NormalizerConfig,
    /// Stage validation configuration.
    pub stage: StageConfig,
    /// Flattener configuration.
    pub flatten: FlattenConfig,
}

impl QuarryConfig {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json(json: &str) -> QuarryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this configuration to pretty-printed JSON.
    pub fn to_json(&self) -> QuarryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Rewrite engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Floor of the fixpoint iteration budget. The normalizer allows one
    /// iteration per node of the input when that is more, and reports an
    /// invariant violation once the budget is spent.
    pub max_iterations: usize,
    /// Whether to record a before/after trace of every rule application.
    pub enable_trace: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            enable_trace: false,
        }
    }
}

impl NormalizerConfig {
    /// Set the maximum number of iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable tracing.
    #[must_use]
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}

/// Classes of primitive operators a backend may be able to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperatorClass {
    /// `+ - * / %` and negation.
    Arithmetic,
    /// `= <> < <= > >=`.
    Comparison,
    /// `AND OR NOT`.
    Boolean,
    /// String concatenation.
    String,
    /// Calls to named host functions.
    HostFunction,
}

/// The capability set handed to the stage validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Operator classes the backend can execute.
    pub allowed: BTreeSet<OperatorClass>,
    /// Host functions the backend can execute. Only consulted when
    /// [`OperatorClass::HostFunction`] is allowed.
    pub host_functions: BTreeSet<String>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            allowed: [
                OperatorClass::Arithmetic,
                OperatorClass::Comparison,
                OperatorClass::Boolean,
                OperatorClass::String,
            ]
            .into_iter()
            .collect(),
            host_functions: BTreeSet::new(),
        }
    }
}

impl StageConfig {
    /// Only arithmetic, comparison and boolean operators.
    pub fn pure_arithmetic() -> Self {
        Self {
            allowed: [
                OperatorClass::Arithmetic,
                OperatorClass::Comparison,
                OperatorClass::Boolean,
            ]
            .into_iter()
            .collect(),
            host_functions: BTreeSet::new(),
        }
    }

    /// Allow calls to the named host function.
    #[must_use]
    pub fn with_host_function(mut self, name: impl Into<String>) -> Self {
        self.allowed.insert(OperatorClass::HostFunction);
        self.host_functions.insert(name.into());
        self
    }

    /// Whether an operator class is executable.
    pub fn allows(&self, class: OperatorClass) -> bool {
        self.allowed.contains(&class)
    }

    /// Whether a host function is executable.
    pub fn allows_host_function(&self, name: &str) -> bool {
        self.allows(OperatorClass::HostFunction) && self.host_functions.contains(name)
    }
}

/// Flattener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Rename generator binders so every binder in a flat comprehension is
    /// distinct. Disabling this is only safe for terms built without
    /// shadowing.
    pub unique_binders: bool,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            unique_binders: true,
        }
    }
}
