//! Rewrite rules of the Quarry normalizer.
//!
//! Every rule maps a term to an equivalent term of the same type:
//!
//! - **Beta reduction** (R1): substitute arguments into function bodies
//! - **Projection reduction** (R2): select fields of literal records
//! - **Comprehension fusion** (R3): unnest comprehensions in generator position
//! - **Conditional generators** (R4): split comprehensions over conditionals
//! - **Collection combinators** (R5): distribute over union, drop empties
//! - **Guard normalization**: turn collection conditionals into guards
//! - **Constant folding**: evaluate literal sub-terms
//!
//! # Rewrite Safety
//!
//! A rewrite is **legal** if and only if all of the following hold:
//!
//! 1. **Bag preservation**: the multiset of elements produced is identical
//! 2. **Type preservation**: the rewritten term has exactly the same type
//! 3. **Scope preservation**: no free variable is captured by a binder

mod beta;
mod combinators;
mod conditional;
mod constant_folding;
mod fusion;
mod guards;
mod normalizer;
mod projection;
mod rule;

pub use beta::BetaReduction;
pub use combinators::CollectionCombinators;
pub use conditional::ConditionalGenerator;
pub use constant_folding::ConstantFolding;
pub use fusion::ComprehensionFusion;
pub use guards::GuardNormalization;
pub use normalizer::{default_rules, Normalizer};
pub use projection::ProjectionReduction;
pub use rule::{NormalizedTerm, RewriteRule, RuleTrace, Transformed};
