//! Rewrite rule trait and framework.
//!
//! This module defines the core abstraction for rewrite rules and the
//! traversal they share.

use common_error::{QuarryError, QuarryResult};
use quarry_core::Type;
use quarry_logical::{Term, TypeChecker, TypeEnv};

/// A single rewrite rule of the normalizer.
///
/// A rule is applied to the whole term in one post-order pass: children are
/// rewritten before their parent (innermost-leftmost). Every rewrite must
/// preserve both the type and the bag semantics of the term it replaces.
pub trait RewriteRule: Send + Sync {
    /// Get the name of this rule.
    fn name(&self) -> &'static str;

    /// Get a description of what this rule does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Apply this rule everywhere in the term.
    ///
    /// Returns `Ok(transformed)` where the term may be unchanged if the rule
    /// doesn't apply.
    fn apply(&self, term: Term) -> QuarryResult<Transformed>;
}

/// The result of applying a rewrite rule.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The (potentially rewritten) term.
    pub term: Term,
    /// Whether the term was actually changed.
    pub changed: bool,
}

impl Transformed {
    /// Create a new transformed result indicating the term was changed.
    pub fn yes(term: Term) -> Self {
        Self {
            term,
            changed: true,
        }
    }

    /// Create a new transformed result indicating the term was unchanged.
    pub fn no(term: Term) -> Self {
        Self {
            term,
            changed: false,
        }
    }

    fn from_pair((term, changed): (Term, bool)) -> Self {
        Self { term, changed }
    }
}

impl From<Term> for Transformed {
    fn from(term: Term) -> Self {
        Self::no(term)
    }
}

/// A trace entry for a single rule application.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    /// The name of the rule that was applied.
    pub rule_name: String,
    /// The term before the rule was applied.
    pub before: String,
    /// The term after the rule was applied.
    pub after: String,
    /// Whether the rule actually changed the term.
    pub changed: bool,
}

impl RuleTrace {
    /// Create a new trace entry.
    pub fn new(
        rule_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The result of normalization with optional trace information.
#[derive(Debug, Clone)]
pub struct NormalizedTerm {
    /// The normal form.
    pub term: Term,
    /// Number of fixpoint iterations performed.
    pub iterations: usize,
    /// Number of rule passes that changed the term.
    pub rules_applied: usize,
    /// Detailed trace of rule applications (if tracing was enabled).
    pub trace: Vec<RuleTrace>,
}

impl NormalizedTerm {
    /// Create a result for a term no rule touched.
    pub fn new(term: Term) -> Self {
        Self {
            term,
            iterations: 0,
            rules_applied: 0,
            trace: Vec::new(),
        }
    }

    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Normalization completed in {} iterations, {} rules applied\n",
            self.iterations, self.rules_applied
        ));

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Rule {} applied: {} ---\n",
                    i + 1,
                    entry.rule_name
                ));
                output.push_str("Before:\n");
                output.push_str(&entry.before);
                output.push_str("\nAfter:\n");
                output.push_str(&entry.after);
                output.push('\n');
            }
        }

        output
    }
}

/// Rewrite `term` bottom-up with `f`, tracking the types of the variables in
/// scope so that rules can build typed empty collections.
///
/// `f` sees each rebuilt node together with the environment of that node
/// (binders of the node itself are not in scope).
pub(crate) fn rewrite_bottom_up<F>(term: Term, f: &mut F) -> QuarryResult<Transformed>
where
    F: FnMut(&mut TypeEnv, Term) -> QuarryResult<(Term, bool)>,
{
    let mut env = TypeEnv::new();
    rewrite_in(term, &mut env, f).map(Transformed::from_pair)
}

fn rewrite_in<F>(term: Term, env: &mut TypeEnv, f: &mut F) -> QuarryResult<(Term, bool)>
where
    F: FnMut(&mut TypeEnv, Term) -> QuarryResult<(Term, bool)>,
{
    let mut changed = false;
    let rebuilt = match term {
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            let (source, c) = rewrite_in(*source, env, f)?;
            changed |= c;
            let element = element_type(&source, env)?;

            env.push(binder.clone(), element);
            let scoped = rewrite_scope(predicate.map(|p| *p), *body, env, f);
            env.pop();
            let (predicate, body, c) = scoped?;
            changed |= c;

            Term::comprehension(source, binder, predicate, body)
        }
        Term::Lambda {
            param,
            param_type,
            body,
        } => {
            env.push(param.clone(), param_type.clone());
            let result = rewrite_in(*body, env, f);
            env.pop();
            let (body, c) = result?;
            changed |= c;
            Term::lambda(param, param_type, body)
        }
        other => other.map_children(|child| {
            let (child, c) = rewrite_in(child, env, f)?;
            changed |= c;
            Ok(child)
        })?,
    };

    let (result, c) = f(env, rebuilt)?;
    Ok((result, changed || c))
}

type Scope = (Option<Term>, Term, bool);

fn rewrite_scope<F>(
    predicate: Option<Term>,
    body: Term,
    env: &mut TypeEnv,
    f: &mut F,
) -> QuarryResult<Scope>
where
    F: FnMut(&mut TypeEnv, Term) -> QuarryResult<(Term, bool)>,
{
    let mut changed = false;
    let predicate = match predicate {
        Some(p) => {
            let (p, c) = rewrite_in(p, env, f)?;
            changed |= c;
            Some(p)
        }
        None => None,
    };
    let (body, c) = rewrite_in(body, env, f)?;
    Ok((predicate, body, changed || c))
}

/// Element type of a collection-typed term under `env`.
pub(crate) fn element_type(term: &Term, env: &mut TypeEnv) -> QuarryResult<Type> {
    match TypeChecker::structural().type_of_in(term, env)? {
        Type::Collection(element) => Ok(*element),
        other => Err(QuarryError::invariant(format!(
            "expected a collection during rewriting, found {other}"
        ))),
    }
}

/// Element type of `body` with `binder` bound to `binder_type`.
pub(crate) fn element_type_under(
    binder: &str,
    binder_type: Type,
    body: &Term,
    env: &mut TypeEnv,
) -> QuarryResult<Type> {
    env.push(binder, binder_type);
    let result = element_type(body, env);
    env.pop();
    result
}

/// The empty collection with the same type as `like`.
pub(crate) fn empty_like(like: &Term, env: &mut TypeEnv) -> QuarryResult<Term> {
    Ok(Term::Empty(element_type(like, env)?))
}

/// The empty collection with the type of the comprehension
/// `for binder in source ... do body`.
pub(crate) fn empty_for(
    source: &Term,
    binder: &str,
    body: &Term,
    env: &mut TypeEnv,
) -> QuarryResult<Term> {
    let binder_type = element_type(source, env)?;
    Ok(Term::Empty(element_type_under(
        binder,
        binder_type,
        body,
        env,
    )?))
}
