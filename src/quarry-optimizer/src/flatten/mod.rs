//! Flattening of normal forms into executable queries.
//!
//! A normal-form query is a union of guarded comprehensions over catalog
//! tables. The flattener reads that shape off the term:
//!
//! ```text
//! Q ::= empty | Q union Q | if c then C else empty | C | Table
//! C ::= for x in Table where p do C | yield V
//! ```
//!
//! Every path from the root to a `yield` becomes one [`FlatComprehension`].
//! A yielded value that contains a collection is split off into a
//! correlated subquery, giving a [`QueryTree`] instead of a [`FlatQuery`].

mod query;

pub use query::{
    FlatComprehension, FlatQuery, Flattened, Generator, NestedField, PathSegment, QueryTree,
    TreeBranch,
};

use std::collections::BTreeSet;

use common_config::FlattenConfig;
use common_error::{Location, QuarryError, QuarryResult};
use log::trace;
use quarry_core::Type;
use quarry_logical::{fresh_name, rename_bound, Term, TypeChecker};

/// Generators and conditions accumulated on the way down to a `yield`.
#[derive(Debug, Clone, Default)]
struct Prefix {
    generators: Vec<Generator>,
    conditions: Vec<Term>,
}

/// Turns normal forms into [`Flattened`] queries.
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    config: FlattenConfig,
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FlattenConfig) -> Self {
        Self { config }
    }

    /// Flatten a closed, collection-typed term in normal form.
    ///
    /// # Errors
    ///
    /// - `TypeError` if the term is not a collection
    /// - `InternalInvariantViolation` if the term is not in normal form
    pub fn flatten(&self, term: &Term) -> QuarryResult<Flattened> {
        let ty = TypeChecker::structural().type_of(term)?;
        if !matches!(ty, Type::Collection(_)) {
            return Err(QuarryError::type_error(
                "Collection",
                ty.to_string(),
                Location::root(),
            ));
        }

        let tree = self.tree(term.clone(), &BTreeSet::new())?;
        if tree.is_flat() {
            let branches = tree.branches.into_iter().map(|b| b.comprehension).collect();
            Ok(Flattened::Flat(FlatQuery::new(branches)))
        } else {
            Ok(Flattened::Nested(tree))
        }
    }

    /// Flatten `term`, whose free variables are the binders in `scope`.
    fn tree(&self, term: Term, scope: &BTreeSet<String>) -> QuarryResult<QueryTree> {
        let mut branches = Vec::new();
        self.collect(term, Prefix::default(), scope.clone(), &mut branches)?;
        Ok(QueryTree { branches })
    }

    fn collect(
        &self,
        term: Term,
        mut prefix: Prefix,
        mut scope: BTreeSet<String>,
        out: &mut Vec<TreeBranch>,
    ) -> QuarryResult<()> {
        match term {
            Term::Empty(_) => Ok(()),

            Term::Union(left, right) => {
                self.collect(*left, prefix.clone(), scope.clone(), out)?;
                self.collect(*right, prefix, scope, out)
            }

            Term::If {
                cond,
                then_branch,
                else_branch,
            } if else_branch.is_empty_collection() => {
                prefix.conditions.extend(cond.conjuncts().into_iter().cloned());
                self.collect(*then_branch, prefix, scope, out)
            }

            Term::For { ref source, ref binder, .. } if matches!(**source, Term::Table { .. }) => {
                let comprehension = if self.config.unique_binders && scope.contains(binder) {
                    let fresh = fresh_name(binder, &scope);
                    trace!("renaming generator binder `{binder}` to `{fresh}`");
                    rename_bound(term, &fresh)?
                } else {
                    term
                };

                let Term::For {
                    source,
                    binder,
                    predicate,
                    body,
                } = comprehension
                else {
                    return Err(QuarryError::invariant("renaming changed a comprehension"));
                };
                let Term::Table { name, row } = *source else {
                    return Err(QuarryError::invariant("renaming changed a generator"));
                };

                if let Some(p) = predicate {
                    prefix.conditions.extend(p.conjuncts().into_iter().cloned());
                }
                scope.insert(binder.clone());
                prefix.generators.push(Generator::new(binder, name, row));
                self.collect(*body, prefix, scope, out)
            }

            Term::Table { name, row } => {
                // A bare table yields its rows.
                let stem = name.to_lowercase();
                let binder = if scope.contains(&stem) {
                    fresh_name(&stem, &scope)
                } else {
                    stem
                };
                prefix
                    .generators
                    .push(Generator::new(binder.clone(), name, row));
                self.emit(Term::var(binder), prefix, &scope, out)
            }

            Term::Yield(element) => self.emit(*element, prefix, &scope, out),

            other => Err(QuarryError::invariant(format!(
                "cannot flatten a term outside normal form: {other}"
            ))),
        }
    }

    fn emit(
        &self,
        element: Term,
        prefix: Prefix,
        scope: &BTreeSet<String>,
        out: &mut Vec<TreeBranch>,
    ) -> QuarryResult<()> {
        let mut nested = Vec::new();
        let yield_ = self.split_nested(element, &mut Vec::new(), scope, &mut nested)?;

        if yield_.any(&Term::is_collection_form) {
            return Err(QuarryError::invariant(format!(
                "collection nested inside a non-record value: {yield_}"
            )));
        }

        out.push(TreeBranch {
            comprehension: FlatComprehension {
                generators: prefix.generators,
                conditions: prefix.conditions,
                yield_,
            },
            nested,
        });
        Ok(())
    }

    /// Remove collection-valued parts of `value`, flattening each into a
    /// subquery correlated with `scope`.
    fn split_nested(
        &self,
        value: Term,
        path: &mut Vec<PathSegment>,
        scope: &BTreeSet<String>,
        nested: &mut Vec<NestedField>,
    ) -> QuarryResult<Term> {
        if value.is_collection_form() {
            trace!("splitting nested collection at the element root");
            nested.push(NestedField {
                path: path.clone(),
                subquery: self.tree(value, scope)?,
            });
            return Ok(Term::record(Vec::<(String, Term)>::new()));
        }

        let Term::Record(fields) = value else {
            return Ok(value);
        };

        let mut kept = Vec::with_capacity(fields.len());
        for (index, (label, field)) in fields.into_iter().enumerate() {
            path.push(PathSegment::new(label.clone(), index));
            if field.is_collection_form() {
                trace!("splitting nested collection at field `{label}`");
                nested.push(NestedField {
                    path: path.clone(),
                    subquery: self.tree(field, scope)?,
                });
            } else {
                kept.push((label, self.split_nested(field, path, scope, nested)?));
            }
            path.pop();
        }
        Ok(Term::Record(kept))
    }
}

/// Flatten with the default configuration.
pub fn flatten(term: &Term) -> QuarryResult<Flattened> {
    Flattener::new().flatten(term)
}
