//! The user-facing query pipeline.

use std::sync::Arc;

use common_config::QuarryConfig;
use common_error::QuarryResult;
use log::debug;
use quarry_core::{Catalog, Type};
use quarry_logical::{Term, TypeChecker};
use quarry_optimizer::stage::{Combinator, SpliceArg};
use quarry_optimizer::{Flattened, Flattener, NormalizedTerm, Normalizer, StageValidator};

/// A handle bundling a catalog with the pipeline configuration.
///
/// A session is immutable once built: every operation takes a term and
/// returns a new one, and the catalog is shared read-only.
///
/// ```rust
/// use quarry::{Catalog, DataType, RecordType, Session};
/// use quarry::logical::term::{for_each, for_where, lit, record, table, var, yield_};
///
/// let catalog = Catalog::builder()
///     .register(
///         "People",
///         RecordType::new()
///             .with_field("Name", DataType::String)
///             .with_field("Age", DataType::Int64),
///     )
///     .unwrap()
///     .build_shared();
/// let session = Session::new(catalog.clone());
///
/// let inner = for_where(
///     table(&catalog, "People").unwrap(),
///     "u",
///     var("u").field("Age").gt_eq(lit(30i64)),
///     yield_(record([("name", var("u").field("Name"))])),
/// );
/// let query = for_each(inner, "p", yield_(var("p")));
///
/// let flat = session.compile(query).unwrap().into_flat().unwrap();
/// assert_eq!(
///     flat.to_string(),
///     "for u in People where (u.Age >= 30) yield {name = u.Name}"
/// );
/// ```
#[derive(Clone)]
pub struct Session {
    catalog: Arc<Catalog>,
    config: QuarryConfig,
}

impl Session {
    /// Create a session with the default configuration.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            config: QuarryConfig::default(),
        }
    }

    /// Create a session with the same catalog and a different configuration.
    pub fn with_config(&self, config: QuarryConfig) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    /// Type of a closed term under the session catalog.
    pub fn type_of(&self, term: &Term) -> QuarryResult<Type> {
        TypeChecker::new(&self.catalog).type_of(term)
    }

    /// Type check `term`, then rewrite it to normal form.
    pub fn normalize(&self, term: Term) -> QuarryResult<Term> {
        Ok(self.normalize_traced(term)?.term)
    }

    /// Like [`Session::normalize`], keeping iteration counts and, when
    /// enabled in the config, the rule trace.
    pub fn normalize_traced(&self, term: Term) -> QuarryResult<NormalizedTerm> {
        let ty = self.type_of(&term)?;
        debug!("Normalizing term of type {ty}");
        self.normalizer().normalize(term)
    }

    /// Flatten a term that is already in normal form.
    pub fn flatten(&self, term: &Term) -> QuarryResult<Flattened> {
        Flattener::with_config(self.config.flatten.clone()).flatten(term)
    }

    /// Normalize and flatten.
    pub fn compile(&self, term: Term) -> QuarryResult<Flattened> {
        let normal = self.normalize(term)?;
        self.flatten(&normal)
    }

    /// A stage validator for this session's catalog and capability set.
    pub fn stage_validator(&self) -> StageValidator {
        StageValidator::with_normalizer_config(
            Arc::clone(&self.catalog),
            self.config.stage.clone(),
            self.config.normalizer.clone(),
        )
    }

    /// Validate each argument, splice them into `combinator` and normalize
    /// the result.
    ///
    /// # Errors
    ///
    /// The first `StageError` or `TypeError` raised by an argument, or a
    /// `TypeError` if the arguments do not fit the combinator's parameters.
    pub fn instantiate(&self, combinator: &Combinator, args: &[SpliceArg]) -> QuarryResult<Term> {
        let validator = self.stage_validator();
        let validated = args
            .iter()
            .map(|arg| validator.validate(arg))
            .collect::<QuarryResult<Vec<_>>>()?;
        debug!(
            "Instantiating `{}` with {} validated arguments",
            combinator.name(),
            validated.len()
        );
        self.normalize(combinator.instantiate(validated)?)
    }

    fn normalizer(&self) -> Normalizer {
        Normalizer::with_config(self.config.normalizer.clone())
    }
}
