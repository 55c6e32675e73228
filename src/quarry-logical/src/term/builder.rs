//! Free functions for building terms by hand.
//!
//! ```
//! use quarry_core::{Catalog, DataType, RecordType};
//! use quarry_logical::term::{for_where, lit, record, table, var, yield_};
//!
//! let catalog = Catalog::builder()
//!     .register(
//!         "People",
//!         RecordType::new()
//!             .with_field("Name", DataType::String)
//!             .with_field("Age", DataType::Int64),
//!     )
//!     .unwrap()
//!     .build();
//!
//! let adults = for_where(
//!     table(&catalog, "People").unwrap(),
//!     "u",
//!     var("u").field("Age").gt_eq(lit(30i64)),
//!     yield_(record([("name", var("u").field("Name"))])),
//! );
//! assert_eq!(
//!     adults.to_string(),
//!     "for u in People where (u.Age >= 30) do yield {name = u.Name}"
//! );
//! ```

use common_error::{Location, QuarryResult};
use quarry_core::{Catalog, Type, Value};

use super::Term;

/// A constant.
pub fn lit(value: impl Into<Value>) -> Term {
    Term::constant(value)
}

/// A variable reference.
pub fn var(name: impl Into<String>) -> Term {
    Term::var(name)
}

/// A reference to a catalog collection, with its row type taken from the
/// catalog.
pub fn table(catalog: &Catalog, name: &str) -> QuarryResult<Term> {
    let row = catalog.resolve(name, &Location::root())?;
    Ok(Term::table(name, row.clone()))
}

/// A record.
pub fn record<L: Into<String>>(fields: impl IntoIterator<Item = (L, Term)>) -> Term {
    Term::record(fields)
}

/// A function abstraction.
pub fn lambda(param: impl Into<String>, param_type: Type, body: Term) -> Term {
    Term::lambda(param, param_type, body)
}

/// A function application.
pub fn apply(func: Term, arg: Term) -> Term {
    func.apply(arg)
}

/// `for binder in source do body`.
pub fn for_each(source: Term, binder: impl Into<String>, body: Term) -> Term {
    Term::comprehension(source, binder, None, body)
}

/// `for binder in source where predicate do body`.
pub fn for_where(source: Term, binder: impl Into<String>, predicate: Term, body: Term) -> Term {
    Term::comprehension(source, binder, Some(predicate), body)
}

/// A singleton collection.
pub fn yield_(element: Term) -> Term {
    Term::singleton(element)
}

/// The empty collection of `element` values.
pub fn empty(element: Type) -> Term {
    Term::Empty(element)
}

/// A bag union.
pub fn union(left: Term, right: Term) -> Term {
    Term::union_all(left, right)
}

/// A conditional.
pub fn if_then_else(cond: Term, then_branch: Term, else_branch: Term) -> Term {
    Term::if_then_else(cond, then_branch, else_branch)
}
