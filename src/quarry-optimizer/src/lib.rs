//! Normalizer, stage validator and flattener for Quarry terms.
//!
//! - [`rules`]: the rewrite rules and the fixed-point [`Normalizer`]
//! - [`stage`]: splice-time validation of higher-order arguments
//! - [`flatten`]: normal forms to [`FlatQuery`] / [`QueryTree`]

pub mod flatten;
pub mod rules;
pub mod stage;

pub use flatten::{Flattened, Flattener, FlatComprehension, FlatQuery, QueryTree};
pub use rules::{NormalizedTerm, Normalizer, RewriteRule};
pub use stage::{Combinator, SpliceArg, StageValidator, ValidatedTerm};

use common_error::QuarryResult;
use quarry_logical::Term;

/// Normalize a closed, well-typed term using the default normalizer.
pub fn normalize(term: Term) -> QuarryResult<Term> {
    let normalizer = Normalizer::default();
    Ok(normalizer.normalize(term)?.term)
}
