//! Term layer for Quarry.
//!
//! `quarry-logical` provides the query calculus that every other layer
//! manipulates:
//!
//! - **Terms**: an immutable tree of comprehensions, records, conditionals,
//!   primitive operators, functions and the collection primitives
//!   (`Yield`, `Empty`, `Union`)
//! - **Builders**: free functions and fluent methods for writing terms by hand
//! - **Substitution**: free variables and capture-avoiding substitution
//! - **Alpha-equivalence**: equality up to renaming of bound variables
//! - **Type checking**: type derivation against an explicit catalog
//!
//! # Example
//!
//! ```rust
//! use quarry_core::{Catalog, DataType, RecordType, Type};
//! use quarry_logical::term::{for_where, lit, record, table, var, yield_};
//! use quarry_logical::TypeChecker;
//!
//! let catalog = Catalog::builder()
//!     .register(
//!         "People",
//!         RecordType::new()
//!             .with_field("Name", DataType::String)
//!             .with_field("Age", DataType::Int64),
//!     )
//!     .unwrap()
//!     .build();
//!
//! let adults = for_where(
//!     table(&catalog, "People").unwrap(),
//!     "u",
//!     var("u").field("Age").gt_eq(lit(30i64)),
//!     yield_(record([("name", var("u").field("Name"))])),
//! );
//!
//! let ty = TypeChecker::new(&catalog).type_of(&adults).unwrap();
//! assert_eq!(ty.to_string(), "Collection<{name: String}>");
//! ```

pub mod alpha;
pub mod subst;
pub mod term;
pub mod typecheck;

// Re-export commonly used types
pub use alpha::{alpha_equals, alpha_equals_under, canonical_key};
pub use subst::{free_vars, fresh_name, occurs_free, rename_bound, substitute};
pub use term::{Effect, HostFunction, PrimOp, Term};
pub use typecheck::{TypeChecker, TypeEnv};
