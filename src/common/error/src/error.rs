//! Core error types for Quarry.

use thiserror::Error;

use crate::Location;

/// Result type alias using `QuarryError`.
pub type QuarryResult<T> = std::result::Result<T, QuarryError>;

/// Core error type for Quarry operations.
///
/// `TypeError` and `StageError` are caller-recoverable and always carry the
/// location of the offending sub-term. `InternalInvariantViolation` signals a
/// defect in the front end or the normalizer and aborts only the current call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuarryError {
    /// Ill-typed term.
    #[error("TypeError at {location}: expected {expected}, found {found}")]
    TypeError {
        /// The type (or shape) that was required.
        expected: String,
        /// The type (or shape) that was found.
        found: String,
        /// Path from the root of the checked term to the offending sub-term.
        location: Location,
    },

    /// A spliced higher-order argument contains recursion, effects, or
    /// operators the backend cannot execute.
    #[error("StageError at {location}: {reason}")]
    StageError {
        /// What was rejected.
        reason: String,
        /// Path from the root of the spliced term to the offending construct.
        location: Location,
    },

    /// Unbound variable, exceeded rewrite bound, or a shape the normalizer
    /// promised could not occur.
    #[error("InternalInvariantViolation: {0}")]
    InternalInvariantViolation(String),

    /// Failure while executing a query against a backend.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Feature not supported by a translation target.
    #[error("NotImplemented: {0}")]
    NotImplemented(String),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl QuarryError {
    /// Create a new `TypeError`.
    pub fn type_error<E: Into<String>, F: Into<String>>(
        expected: E,
        found: F,
        location: Location,
    ) -> Self {
        Self::TypeError {
            expected: expected.into(),
            found: found.into(),
            location,
        }
    }

    /// Create a new `StageError`.
    pub fn stage<S: Into<String>>(reason: S, location: Location) -> Self {
        Self::StageError {
            reason: reason.into(),
            location,
        }
    }

    /// Create a new `InternalInvariantViolation`.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InternalInvariantViolation(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `NotImplemented` error.
    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// The location carried by this error, if it has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::TypeError { location, .. } | Self::StageError { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Whether the caller can fix this error by rewriting the query.
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::TypeError { .. } | Self::StageError { .. })
    }
}

/// Ensure an internal invariant holds, returning an
/// `InternalInvariantViolation` if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::QuarryError::InternalInvariantViolation(
                $msg.to_string(),
            ));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::QuarryError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with an `ExecutionError`.
#[macro_export]
macro_rules! exec_err {
    ($($arg:tt)*) => {
        return Err($crate::QuarryError::ExecutionError(format!($($arg)*)))
    };
}
