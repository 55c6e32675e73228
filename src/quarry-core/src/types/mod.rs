//! Type system for Quarry terms.
//!
//! `Value` and `DataType` describe base constants; `Type` describes every
//! term, including records, functions and collections.

mod conformance;
mod data_type;
mod ty;
mod value;

pub use conformance::{check_row_invariants, check_type_invariants};
pub use data_type::DataType;
pub use ty::{RecordType, Type};
pub use value::Value;
