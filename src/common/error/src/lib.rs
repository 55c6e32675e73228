//! Error types and result aliases for Quarry.
//!
//! Every fallible operation in the workspace returns [`QuarryResult`]. Errors
//! that pinpoint a sub-term carry a [`Location`].

mod error;
mod location;

pub use error::{QuarryError, QuarryResult};
pub use location::Location;
