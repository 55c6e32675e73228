//! Nested-loop execution of flattened queries.

use common_error::{QuarryError, QuarryResult};
use log::debug;
use quarry_logical::Term;
use quarry_optimizer::flatten::{
    FlatComprehension, FlatQuery, Flattened, Generator, PathSegment, QueryTree,
};

use crate::backend::Backend;
use crate::datum::{Datum, Env};
use crate::interpreter::Interpreter;

/// Executes flat queries against a [`Backend`].
///
/// Each comprehension runs as nested loops over its generators in order,
/// with every condition tested once all binders are in scope.
pub struct FlatExecutor<'a> {
    backend: &'a dyn Backend,
    interpreter: Interpreter<'a>,
}

impl<'a> FlatExecutor<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            interpreter: Interpreter::new(backend),
        }
    }

    /// Run every branch of `query` and collect the resulting bag.
    pub fn execute(&self, query: &FlatQuery) -> QuarryResult<Vec<Datum>> {
        let mut out = Vec::new();
        for branch in &query.branches {
            self.run_branch(branch, &mut Env::new(), &mut |env: &mut Env| {
                out.push(self.interpreter.eval_in(&branch.yield_, env)?);
                Ok(())
            })?;
        }
        debug!("Flat query produced {} rows", out.len());
        Ok(out)
    }

    /// Run a query tree, executing each nested subquery once per parent row.
    pub fn execute_tree(&self, tree: &QueryTree) -> QuarryResult<Vec<Datum>> {
        self.run_tree(tree, &mut Env::new())
    }

    /// Run whichever shape the flattener produced.
    pub fn execute_flattened(&self, flattened: &Flattened) -> QuarryResult<Vec<Datum>> {
        match flattened {
            Flattened::Flat(query) => self.execute(query),
            Flattened::Nested(tree) => self.execute_tree(tree),
        }
    }

    fn run_tree(&self, tree: &QueryTree, env: &mut Env) -> QuarryResult<Vec<Datum>> {
        let mut out = Vec::new();
        for branch in &tree.branches {
            self.run_branch(&branch.comprehension, env, &mut |env: &mut Env| {
                let mut element = self.interpreter.eval_in(&branch.comprehension.yield_, env)?;
                // nested fields were removed in order, so restoring them in
                // the same order puts each back at its original index
                for field in &branch.nested {
                    let bag = Datum::Bag(self.run_tree(&field.subquery, env)?);
                    element = reinsert(element, &field.path, bag)?;
                }
                out.push(element);
                Ok(())
            })?;
        }
        Ok(out)
    }

    fn run_branch(
        &self,
        branch: &FlatComprehension,
        env: &mut Env,
        emit: &mut dyn FnMut(&mut Env) -> QuarryResult<()>,
    ) -> QuarryResult<()> {
        self.nested_loop(&branch.generators, &branch.conditions, env, emit)
    }

    fn nested_loop(
        &self,
        generators: &[Generator],
        conditions: &[Term],
        env: &mut Env,
        emit: &mut dyn FnMut(&mut Env) -> QuarryResult<()>,
    ) -> QuarryResult<()> {
        let Some((generator, rest)) = generators.split_first() else {
            for condition in conditions {
                if !self.interpreter.eval_in(condition, env)?.to_bool()? {
                    return Ok(());
                }
            }
            return emit(env);
        };

        for row in self.backend.enumerate(&generator.table)? {
            env.push((generator.binder.clone(), row));
            let result = self.nested_loop(rest, conditions, env, emit);
            env.pop();
            result?;
        }
        Ok(())
    }
}

/// Put `bag` back into `element` at `path`.
fn reinsert(mut element: Datum, path: &[PathSegment], bag: Datum) -> QuarryResult<Datum> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(bag);
    };

    let mut target = &mut element;
    for segment in parents {
        let Datum::Record(fields) = target else {
            return Err(QuarryError::invariant(format!(
                "nested field path passes through a non-record at `{}`",
                segment.label
            )));
        };
        target = fields
            .iter_mut()
            .find(|(label, _)| *label == segment.label)
            .map(|(_, d)| d)
            .ok_or_else(|| {
                QuarryError::invariant(format!("record lost field `{}`", segment.label))
            })?;
    }

    let Datum::Record(fields) = target else {
        return Err(QuarryError::invariant(format!(
            "cannot restore nested field `{}` into a non-record",
            last.label
        )));
    };
    let at = last.index.min(fields.len());
    fields.insert(at, (last.label.clone(), bag));
    Ok(element)
}
