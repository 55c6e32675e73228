//! Direct evaluation of terms.
//!
//! The interpreter gives every closed, well-typed term its meaning without
//! normalizing it first. Comprehensions run as nested loops and functions
//! become closures.

use common_error::{QuarryError, QuarryResult};
use log::trace;
use quarry_core::Value;
use quarry_logical::{PrimOp, Term};

use crate::backend::Backend;
use crate::datum::{Closure, Datum, Env};

/// Reference evaluator for terms.
pub struct Interpreter<'a> {
    backend: &'a dyn Backend,
}

impl<'a> Interpreter<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Evaluate a closed term.
    pub fn eval(&self, term: &Term) -> QuarryResult<Datum> {
        self.eval_in(term, &mut Env::new())
    }

    /// Evaluate a term whose free variables are bound in `env`.
    pub fn eval_in(&self, term: &Term, env: &mut Env) -> QuarryResult<Datum> {
        match term {
            Term::Const(v) => Ok(Datum::Base(v.clone())),

            Term::Var(name) => lookup(env, name).cloned(),

            Term::Table { name, .. } => Ok(Datum::Bag(self.backend.enumerate(name)?)),

            Term::For {
                source,
                binder,
                predicate,
                body,
            } => {
                let rows = self.eval_in(source, env)?.into_bag()?;
                trace!("iterating {} rows for `{binder}`", rows.len());

                let mut out = Vec::new();
                for row in rows {
                    env.push((binder.clone(), row));
                    let result = self.eval_iteration(predicate.as_deref(), body, env);
                    env.pop();
                    if let Some(items) = result? {
                        out.extend(items);
                    }
                }
                Ok(Datum::Bag(out))
            }

            Term::Record(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (label, field) in fields {
                    out.push((label.clone(), self.eval_in(field, env)?));
                }
                Ok(Datum::Record(out))
            }

            Term::Project { term, label } => Ok(self.eval_in(term, env)?.field(label)?.clone()),

            Term::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_in(cond, env)?.to_bool()? {
                    self.eval_in(then_branch, env)
                } else {
                    self.eval_in(else_branch, env)
                }
            }

            Term::Prim { op, args } => self.eval_prim(op, args, env),

            Term::Lambda { param, body, .. } => Ok(Datum::Closure(Closure {
                param: param.clone(),
                body: (**body).clone(),
                env: env.clone(),
            })),

            Term::Apply { func, arg } => {
                let Datum::Closure(closure) = self.eval_in(func, env)? else {
                    return Err(QuarryError::execution("applied a value that is not a function"));
                };
                let arg = self.eval_in(arg, env)?;
                let mut inner = closure.env;
                inner.push((closure.param, arg));
                self.eval_in(&closure.body, &mut inner)
            }

            Term::Yield(element) => Ok(Datum::Bag(vec![self.eval_in(element, env)?])),

            Term::Empty(_) => Ok(Datum::Bag(Vec::new())),

            Term::Union(left, right) => {
                let mut items = self.eval_in(left, env)?.into_bag()?;
                items.extend(self.eval_in(right, env)?.into_bag()?);
                Ok(Datum::Bag(items))
            }
        }
    }

    /// One iteration of a comprehension, with the binder already in `env`.
    fn eval_iteration(
        &self,
        predicate: Option<&Term>,
        body: &Term,
        env: &mut Env,
    ) -> QuarryResult<Option<Vec<Datum>>> {
        if let Some(p) = predicate {
            if !self.eval_in(p, env)?.to_bool()? {
                return Ok(None);
            }
        }
        self.eval_in(body, env)?.into_bag().map(Some)
    }

    fn eval_prim(&self, op: &PrimOp, args: &[Term], env: &mut Env) -> QuarryResult<Datum> {
        // AND and OR short-circuit
        if let (PrimOp::And | PrimOp::Or, [left, right]) = (op, args) {
            let l = self.eval_in(left, env)?.to_bool()?;
            if l == (*op == PrimOp::Or) {
                return Ok(Datum::Base(Value::Bool(l)));
            }
            return Ok(Datum::Base(Value::Bool(self.eval_in(right, env)?.to_bool()?)));
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval_in(arg, env)? {
                Datum::Base(v) => values.push(v),
                other => {
                    return Err(QuarryError::execution(format!(
                        "operator `{op}` applied to non-base value {other}"
                    )))
                }
            }
        }
        Ok(Datum::Base(self.backend.evaluate(op, &values)?))
    }
}

/// Innermost binding of `name`.
pub(crate) fn lookup<'e>(env: &'e Env, name: &str) -> QuarryResult<&'e Datum> {
    env.iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, d)| d)
        .ok_or_else(|| QuarryError::execution(format!("unbound variable `{name}`")))
}
