//! Splice-time validation of higher-order query arguments.
//!
//! A [`Combinator`] is a query parameterized by other queries or functions.
//! Every argument spliced into one must first pass the [`StageValidator`],
//! which rejects recursion, effects and operators the backend cannot run.
//! The check happens once per splice point, before any data is touched.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use common_config::StageConfig;
//! use quarry_core::{Catalog, Type};
//! use quarry_logical::term::{lambda, lit, var};
//! use quarry_optimizer::stage::{SpliceArg, StageValidator};
//!
//! let validator = StageValidator::new(Arc::new(Catalog::empty()), StageConfig::default());
//! let is_even = lambda("x", Type::int(), var("x").modulo(lit(2i64)).eq(lit(0i64)));
//!
//! let validated = validator.validate(&SpliceArg::anonymous(is_even)).unwrap();
//! assert_eq!(validated.ty(), &Type::function(Type::int(), Type::bool()));
//! assert_eq!(validator.checks_performed(), 1);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common_config::{NormalizerConfig, OperatorClass, StageConfig};
use common_error::{Location, QuarryError, QuarryResult};
use log::debug;
use quarry_core::{Catalog, Type};
use quarry_logical::{free_vars, PrimOp, Term, TypeChecker};

use crate::rules::Normalizer;

/// An argument about to be spliced into a combinator.
///
/// A front end that lets users define named helpers passes the name along,
/// so that a definition referring to itself is caught as recursion rather
/// than as an ordinary open term.
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceArg {
    name: Option<String>,
    term: Term,
}

impl SpliceArg {
    /// An unnamed argument.
    pub fn anonymous(term: Term) -> Self {
        Self { name: None, term }
    }

    /// An argument defined under `name`.
    pub fn named(name: impl Into<String>, term: Term) -> Self {
        Self {
            name: Some(name.into()),
            term,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn term(&self) -> &Term {
        &self.term
    }
}

/// A spliced argument that passed stage validation.
///
/// Only [`StageValidator::validate`] constructs this, so holding one proves
/// the check already happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTerm {
    term: Term,
    ty: Type,
}

impl ValidatedTerm {
    /// The normal form of the argument.
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// The type of the argument.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn into_term(self) -> Term {
        self.term
    }
}

/// Validates arguments against a backend capability set.
pub struct StageValidator {
    catalog: Arc<Catalog>,
    config: StageConfig,
    normalizer: Normalizer,
    checks_performed: AtomicUsize,
}

impl StageValidator {
    /// Create a validator for the given catalog and capability set.
    pub fn new(catalog: Arc<Catalog>, config: StageConfig) -> Self {
        Self::with_normalizer_config(catalog, config, NormalizerConfig::default())
    }

    /// Create a validator that normalizes arguments with a custom config.
    pub fn with_normalizer_config(
        catalog: Arc<Catalog>,
        config: StageConfig,
        normalizer: NormalizerConfig,
    ) -> Self {
        Self {
            catalog,
            config,
            normalizer: Normalizer::with_config(normalizer),
            checks_performed: AtomicUsize::new(0),
        }
    }

    /// The capability set in use.
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Number of arguments checked so far, accepted or not.
    pub fn checks_performed(&self) -> usize {
        self.checks_performed.load(Ordering::Relaxed)
    }

    /// Check an argument and return its validated normal form.
    ///
    /// The capability scan runs on the normal form. A rejection is located in
    /// the argument as written when the same construct appears there, and in
    /// the normal form otherwise.
    ///
    /// # Errors
    ///
    /// - `StageError` for a self-reference, a free variable, an effectful
    ///   host function, or an operator outside the capability set
    /// - `TypeError` if the argument is ill-typed
    pub fn validate(&self, arg: &SpliceArg) -> QuarryResult<ValidatedTerm> {
        self.checks_performed.fetch_add(1, Ordering::Relaxed);
        let root = Location::root();

        if let Some(name) = arg.name() {
            if let Some(location) = find_free(&arg.term, name, &root) {
                debug!("Rejected splice of `{name}`: self-reference at {location}");
                return Err(QuarryError::stage(
                    format!("recursive self-reference to `{name}`"),
                    location,
                ));
            }
        }

        if let Some(var) = free_vars(&arg.term).into_iter().next() {
            let location = find_free(&arg.term, &var, &root).unwrap_or_default();
            return Err(QuarryError::stage(
                format!("open term: free variable `{var}`"),
                location,
            ));
        }

        let ty = TypeChecker::new(&self.catalog).type_of(&arg.term)?;
        let normal = self.normalizer.normalize(arg.term.clone())?.term;
        if let Err(err) = self.check_executable(&normal, &root) {
            return Err(match self.check_executable(&arg.term, &root) {
                Err(written) if stage_reason(&written) == stage_reason(&err) => written,
                _ => err,
            });
        }

        debug!("Validated splice argument of type {ty}");
        Ok(ValidatedTerm { term: normal, ty })
    }

    fn check_executable(&self, term: &Term, location: &Location) -> QuarryResult<()> {
        if let Term::Prim { op, .. } = term {
            self.check_operator(op, location)?;
        }
        for (segment, child) in term.labelled_children() {
            self.check_executable(child, &location.child(segment))?;
        }
        Ok(())
    }

    fn check_operator(&self, op: &PrimOp, location: &Location) -> QuarryResult<()> {
        if let PrimOp::Call(func) = op {
            if !func.is_pure() {
                return Err(QuarryError::stage(
                    format!("effectful host function `{}`", func.name),
                    location.clone(),
                ));
            }
            if !self.config.allows_host_function(&func.name) {
                return Err(QuarryError::stage(
                    format!(
                        "host function `{}` is not executable by the backend",
                        func.name
                    ),
                    location.clone(),
                ));
            }
            return Ok(());
        }

        let class = operator_class(op);
        if self.config.allows(class) {
            Ok(())
        } else {
            Err(QuarryError::stage(
                format!("{class:?} operator `{op}` is not executable by the backend"),
                location.clone(),
            ))
        }
    }
}

fn stage_reason(err: &QuarryError) -> Option<&str> {
    match err {
        QuarryError::StageError { reason, .. } => Some(reason),
        _ => None,
    }
}

/// The capability class an operator belongs to.
pub fn operator_class(op: &PrimOp) -> OperatorClass {
    match op {
        PrimOp::Call(_) => OperatorClass::HostFunction,
        PrimOp::Concat => OperatorClass::String,
        op if op.is_arithmetic() => OperatorClass::Arithmetic,
        op if op.is_comparison() => OperatorClass::Comparison,
        _ => OperatorClass::Boolean,
    }
}

/// Location of the first free occurrence of `name` in `term`.
fn find_free(term: &Term, name: &str, location: &Location) -> Option<Location> {
    let bound_here = match term {
        Term::Var(v) => return (v == name).then(|| location.clone()),
        Term::For { binder, .. } => binder == name,
        Term::Lambda { param, .. } => param == name,
        _ => false,
    };

    term.labelled_children()
        .into_iter()
        // a binder scopes over everything except the generator source
        .filter(|(segment, _)| !bound_here || segment == "source")
        .find_map(|(segment, child)| find_free(child, name, &location.child(segment)))
}

/// A query parameterized by spliced arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Combinator {
    name: String,
    params: Vec<(String, Type)>,
    body: Term,
}

impl Combinator {
    /// Create a combinator. `body` may refer to the parameters freely.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = (S, Type)>,
        body: Term,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(|(p, t)| (p.into(), t)).collect(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, Type)] {
        &self.params
    }

    pub fn body(&self) -> &Term {
        &self.body
    }

    /// The combinator as a closed, curried function.
    pub fn as_term(&self) -> Term {
        self.params
            .iter()
            .rev()
            .fold(self.body.clone(), |body, (param, ty)| {
                Term::lambda(param.clone(), ty.clone(), body)
            })
    }

    /// Splice validated arguments into the combinator.
    ///
    /// The result is the application of [`Combinator::as_term`] to the
    /// arguments; it still has to be normalized.
    pub fn instantiate(&self, args: Vec<ValidatedTerm>) -> QuarryResult<Term> {
        if args.len() != self.params.len() {
            return Err(QuarryError::type_error(
                format!("{} arguments to `{}`", self.params.len(), self.name),
                format!("{} arguments", args.len()),
                Location::root(),
            ));
        }

        for (i, ((_, expected), arg)) in self.params.iter().zip(&args).enumerate() {
            if arg.ty() != expected {
                return Err(QuarryError::type_error(
                    expected.to_string(),
                    arg.ty().to_string(),
                    Location::root().arg(i),
                ));
            }
        }

        Ok(args
            .into_iter()
            .fold(self.as_term(), |func, arg| func.apply(arg.into_term())))
    }
}
