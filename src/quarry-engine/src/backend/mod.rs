//! The bridge between executable queries and a data source.

mod memory;

pub use memory::{HostFn, MemoryBackend};

use common_error::QuarryResult;
use quarry_core::Value;
use quarry_logical::PrimOp;

use crate::datum::Datum;

/// A data source that can run flat queries.
///
/// Implementations enumerate catalog collections and evaluate primitive
/// operators, including the host functions they register as executable.
/// Both are read-only, so a backend can be shared between threads.
pub trait Backend: Send + Sync {
    /// All rows of a collection, as record datums in the catalog's field order.
    fn enumerate(&self, table: &str) -> QuarryResult<Vec<Datum>>;

    /// Apply a primitive operator to evaluated operands.
    fn evaluate(&self, op: &PrimOp, args: &[Value]) -> QuarryResult<Value>;
}
