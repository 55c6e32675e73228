//! Terms of the query calculus.
//!
//! This module contains:
//! - `Term`: the immutable term tree
//! - `PrimOp`, `HostFunction`, `Effect`: primitive operators
//! - builder functions for constructing terms by hand

mod builder;
mod prim;
#[allow(clippy::module_inception)]
mod term;

pub use builder::{
    apply, empty, for_each, for_where, if_then_else, lambda, lit, record, table, union, var,
    yield_,
};
pub use prim::{Effect, HostFunction, PrimOp};
pub use term::Term;
