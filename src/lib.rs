//! Quarry - normalization engine for compositional, language-integrated queries
//!
//! Quarry takes a query written as a typed term (comprehensions, records,
//! conditionals and higher-order functions over catalog collections) and
//! rewrites it into a flat union of select-from-where blocks that a
//! relational backend can run.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_error as error;
pub use quarry_core as core;
pub use quarry_engine as engine;
pub use quarry_logical as logical;
pub use quarry_optimizer as optimizer;

mod session;

pub use common_config::QuarryConfig;
pub use common_error::{Location, QuarryError, QuarryResult};
pub use quarry_core::{Catalog, DataType, RecordType, Type, Value};
pub use quarry_logical::Term;
pub use quarry_optimizer::{FlatQuery, Flattened, QueryTree};
pub use session::Session;

/// Quarry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
