//! Reference backend for Quarry.
//!
//! This crate evaluates terms and runs the flat queries produced by the
//! flattener. It is the executable counterpart of the normalizer: the
//! [`Interpreter`] gives any closed term its meaning directly, and the
//! [`FlatExecutor`] runs the flattened form of the same query, so the two
//! can be compared.

#![allow(clippy::missing_const_for_fn)] // Builder patterns often can't be const
#![allow(clippy::unused_self)] // Some methods need self for API symmetry
#![allow(clippy::format_push_string)] // Some format! + push_str patterns are clearer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Term           │ ──▶ │ Normalizer +     │ ──▶ │  FlatExecutor    │
//! │  (quarry-logical)│    │ Flattener        │     │  or SqlRenderer  │
//! └─────────────────┘     └──────────────────┘     └──────────────────┘
//!          │                                               │
//!          ▼                                               ▼
//!     Interpreter ─────────── same bag of Datum ──────── Vec<Datum>
//! ```
//!
//! # Key Components
//!
//! - [`Backend`]: row enumeration and primitive evaluation
//! - [`MemoryBackend`]: tables held in memory, checked against the catalog
//! - [`Datum`]: runtime values, including bags and closures
//! - [`PrimEvaluator`]: built-in operators with checked integer arithmetic
//! - [`Interpreter`]: direct evaluation of arbitrary terms
//! - [`FlatExecutor`]: nested-loop execution of flat queries and query trees
//! - [`SqlRenderer`]: SQL text for flat queries
//!
//! # Example
//!
//! ```rust
//! use quarry_core::{Catalog, DataType, RecordType, Value};
//! use quarry_engine::{FlatExecutor, MemoryBackend};
//! use quarry_logical::term::{for_where, lit, table, var, yield_};
//! use quarry_optimizer::flatten::flatten;
//!
//! let catalog = Catalog::builder()
//!     .register(
//!         "People",
//!         RecordType::new()
//!             .with_field("Name", DataType::String)
//!             .with_field("Age", DataType::Int64),
//!     )
//!     .unwrap()
//!     .build_shared();
//!
//! let backend = MemoryBackend::new(catalog.clone())
//!     .with_rows(
//!         "People",
//!         vec![
//!             vec![Value::from("Ann"), Value::Int64(40)],
//!             vec![Value::from("Bob"), Value::Int64(20)],
//!         ],
//!     )
//!     .unwrap();
//!
//! let query = for_where(
//!     table(&catalog, "People").unwrap(),
//!     "u",
//!     var("u").field("Age").gt(lit(30i64)),
//!     yield_(var("u").field("Name")),
//! );
//! let flat = flatten(&query).unwrap().into_flat().unwrap();
//! let rows = FlatExecutor::new(&backend).execute(&flat).unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

pub mod backend;
pub mod datum;
pub mod eval;
pub mod executor;
pub mod interpreter;
pub mod sql;

// Re-export commonly used types
pub use backend::{Backend, HostFn, MemoryBackend};
pub use datum::{bag_equals, datum_equals, Closure, Datum, Env};
pub use eval::PrimEvaluator;
pub use executor::FlatExecutor;
pub use interpreter::Interpreter;
pub use sql::SqlRenderer;
