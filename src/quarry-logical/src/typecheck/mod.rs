//! Type checking for terms.
//!
//! The checker derives the type of a term against an explicit catalog. Every
//! `TypeError` carries the path from the root of the checked term to the
//! offending sub-term, e.g. `$.body.predicate.args[0]`. Unbound variables are
//! reported as invariant violations: a front end must never build one.

mod env;

pub use env::TypeEnv;

use std::collections::HashSet;

use common_error::{Location, QuarryError, QuarryResult};
use quarry_core::{Catalog, DataType, RecordType, Type};

use crate::term::{PrimOp, Term};

/// Derives types of terms against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct TypeChecker<'a> {
    catalog: Option<&'a Catalog>,
}

impl<'a> TypeChecker<'a> {
    /// Create a type checker over `catalog`.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    /// Create a type checker that trusts the row types recorded on table
    /// references. Used to re-derive types of terms that were already
    /// checked against a catalog.
    pub fn structural() -> Self {
        Self { catalog: None }
    }

    /// The type of a closed term.
    pub fn type_of(&self, term: &Term) -> QuarryResult<Type> {
        self.type_of_in(term, &mut TypeEnv::new())
    }

    /// The type of a term whose free variables are typed by `env`.
    pub fn type_of_in(&self, term: &Term, env: &mut TypeEnv) -> QuarryResult<Type> {
        self.check(term, env, &Location::root())
    }

    fn check(&self, term: &Term, env: &mut TypeEnv, loc: &Location) -> QuarryResult<Type> {
        match term {
            Term::Const(v) => Ok(Type::Base(v.data_type())),

            Term::Var(name) => env.lookup(name).cloned().ok_or_else(|| {
                QuarryError::invariant(format!("unbound variable `{name}` at {loc}"))
            }),

            Term::Table { name, row } => {
                if let Some(catalog) = self.catalog {
                    let registered = catalog.resolve(name, loc)?;
                    if registered != row {
                        return Err(QuarryError::type_error(
                            registered.to_string(),
                            row.to_string(),
                            loc.clone(),
                        ));
                    }
                }
                Ok(Type::collection(Type::Record(row.clone())))
            }

            Term::For {
                source,
                binder,
                predicate,
                body,
            } => {
                let source_loc = loc.child("source");
                let source_ty = self.check(source, env, &source_loc)?;
                let Type::Collection(element) = source_ty else {
                    return Err(QuarryError::type_error(
                        "a collection",
                        source_ty.to_string(),
                        source_loc,
                    ));
                };

                env.push(binder.clone(), *element);
                let result = self.check_scope(predicate.as_deref(), body, env, loc);
                env.pop();
                result
            }

            Term::Record(fields) => {
                let mut seen = HashSet::new();
                let mut record = Vec::with_capacity(fields.len());
                for (label, field) in fields {
                    let field_loc = loc.field(label);
                    if !seen.insert(label.as_str()) {
                        return Err(QuarryError::type_error(
                            "unique record labels",
                            format!("duplicate label `{label}`"),
                            field_loc,
                        ));
                    }
                    record.push((label.clone(), self.check(field, env, &field_loc)?));
                }
                Ok(Type::Record(RecordType::from_fields(record)))
            }

            Term::Project { term: inner, label } => {
                let inner_ty = self.check(inner, env, &loc.child("term"))?;
                inner_ty
                    .as_record()
                    .and_then(|r| r.field(label))
                    .cloned()
                    .ok_or_else(|| {
                        QuarryError::type_error(
                            format!("a record with field `{label}`"),
                            inner_ty.to_string(),
                            loc.clone(),
                        )
                    })
            }

            Term::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect_bool(cond, env, &loc.child("cond"))?;
                let then_ty = self.check(then_branch, env, &loc.child("then"))?;
                let else_ty = self.check(else_branch, env, &loc.child("else"))?;
                if then_ty != else_ty {
                    return Err(QuarryError::type_error(
                        then_ty.to_string(),
                        else_ty.to_string(),
                        loc.child("else"),
                    ));
                }
                Ok(then_ty)
            }

            Term::Prim { op, args } => self.check_prim(op, args, env, loc),

            Term::Lambda {
                param,
                param_type,
                body,
            } => {
                env.push(param.clone(), param_type.clone());
                let body_ty = self.check(body, env, &loc.child("body"));
                env.pop();
                Ok(Type::function(param_type.clone(), body_ty?))
            }

            Term::Apply { func, arg } => {
                let func_loc = loc.child("func");
                let func_ty = self.check(func, env, &func_loc)?;
                let Type::Function(param, result) = func_ty else {
                    return Err(QuarryError::type_error(
                        "a function",
                        func_ty.to_string(),
                        func_loc,
                    ));
                };
                let arg_loc = loc.child("arg");
                let arg_ty = self.check(arg, env, &arg_loc)?;
                if arg_ty != *param {
                    return Err(QuarryError::type_error(
                        param.to_string(),
                        arg_ty.to_string(),
                        arg_loc,
                    ));
                }
                Ok(*result)
            }

            Term::Yield(element) => Ok(Type::collection(self.check(
                element,
                env,
                &loc.child("element"),
            )?)),

            Term::Empty(element) => Ok(Type::collection(element.clone())),

            Term::Union(left, right) => {
                let left_loc = loc.child("left");
                let left_ty = self.check(left, env, &left_loc)?;
                if !left_ty.is_collection() {
                    return Err(QuarryError::type_error(
                        "a collection",
                        left_ty.to_string(),
                        left_loc,
                    ));
                }
                let right_ty = self.check(right, env, &loc.child("right"))?;
                if right_ty != left_ty {
                    return Err(QuarryError::type_error(
                        left_ty.to_string(),
                        right_ty.to_string(),
                        loc.child("right"),
                    ));
                }
                Ok(left_ty)
            }
        }
    }

    /// Predicate and body of a comprehension, with the binder already in
    /// scope.
    fn check_scope(
        &self,
        predicate: Option<&Term>,
        body: &Term,
        env: &mut TypeEnv,
        loc: &Location,
    ) -> QuarryResult<Type> {
        if let Some(p) = predicate {
            self.expect_bool(p, env, &loc.child("predicate"))?;
        }
        let body_loc = loc.child("body");
        let body_ty = self.check(body, env, &body_loc)?;
        if !body_ty.is_collection() {
            return Err(QuarryError::type_error(
                "a collection",
                body_ty.to_string(),
                body_loc,
            ));
        }
        Ok(body_ty)
    }

    fn expect_bool(&self, term: &Term, env: &mut TypeEnv, loc: &Location) -> QuarryResult<()> {
        let ty = self.check(term, env, loc)?;
        if ty != Type::bool() {
            return Err(QuarryError::type_error("Bool", ty.to_string(), loc.clone()));
        }
        Ok(())
    }

    fn check_prim(
        &self,
        op: &PrimOp,
        args: &[Term],
        env: &mut TypeEnv,
        loc: &Location,
    ) -> QuarryResult<Type> {
        if args.len() != op.arity() {
            return Err(QuarryError::type_error(
                format!("{} operand(s) for `{op}`", op.arity()),
                format!("{} operand(s)", args.len()),
                loc.clone(),
            ));
        }

        let mut operand_types = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let arg_loc = loc.arg(i);
            let ty = self.check(arg, env, &arg_loc)?;
            let Some(dt) = ty.as_base() else {
                return Err(QuarryError::type_error(
                    "a base type",
                    ty.to_string(),
                    arg_loc,
                ));
            };
            operand_types.push(dt);
        }

        op.result_type(&operand_types).map(Type::Base).ok_or_else(|| {
            let found = operand_types
                .iter()
                .map(DataType::display_name)
                .collect::<Vec<_>>()
                .join(", ");
            let at = offending_operand(op, &operand_types).map_or_else(|| loc.clone(), |i| loc.arg(i));
            QuarryError::type_error(
                format!("{} for `{op}`", op.signature()),
                found,
                at,
            )
        })
    }
}

/// Index of the first operand that on its own disqualifies the operator, if
/// any. Mismatches between two individually valid operands have none.
fn offending_operand(op: &PrimOp, operands: &[DataType]) -> Option<usize> {
    operands.iter().enumerate().position(|(i, dt)| match op {
        PrimOp::Add
        | PrimOp::Subtract
        | PrimOp::Multiply
        | PrimOp::Divide
        | PrimOp::Modulo
        | PrimOp::Negate => !dt.is_numeric(),
        PrimOp::And | PrimOp::Or | PrimOp::Not => *dt != DataType::Bool,
        PrimOp::Concat => !dt.is_string(),
        PrimOp::Call(func) => func.params.get(i).is_some_and(|p| !dt.can_coerce_to(p)),
        _ => false,
    })
}
