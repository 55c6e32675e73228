//! Core data model for Quarry.
//!
//! This crate provides the fundamental types shared by every layer:
//! - `Value` and `DataType` for base constants
//! - `Type` and `RecordType` for the types of terms
//! - `Catalog` for the immutable collection-name to row-type mapping

pub mod catalog;
pub mod types;

#[cfg(test)]
mod proptest_utils;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogBuilder};
pub use types::{check_row_invariants, check_type_invariants, DataType, RecordType, Type, Value};
