//! The term language.
//!
//! Terms are immutable trees. The front end builds them once; the normalizer
//! consumes them read-only and produces fresh trees.

use std::fmt;

use common_display::{DisplayTree, TreeNode};
use common_error::QuarryResult;
use quarry_core::{RecordType, Type, Value};
use serde::{Deserialize, Serialize};

use super::PrimOp;

/// A term of the nested relational calculus.
///
/// The body of a comprehension is itself collection-typed: elements are
/// produced only through an explicit [`Term::Yield`] (or by another
/// collection-typed term), never by an implicit last expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// A base constant.
    Const(Value),

    /// A reference to a bound variable.
    Var(String),

    /// A reference to a catalog collection.
    Table {
        /// Collection name.
        name: String,
        /// Element record type.
        row: RecordType,
    },

    /// `for binder in source where predicate do body`.
    For {
        /// The generator.
        source: Box<Self>,
        /// Variable bound to each element of `source`; scopes over
        /// `predicate` and `body` only.
        binder: String,
        /// Optional filter.
        predicate: Option<Box<Self>>,
        /// Collection-typed body.
        body: Box<Self>,
    },

    /// A record (tuple with labelled fields).
    Record(Vec<(String, Self)>),

    /// Field projection.
    Project {
        /// The record-typed term.
        term: Box<Self>,
        /// Field label.
        label: String,
    },

    /// Conditional.
    If {
        /// Bool-typed condition.
        cond: Box<Self>,
        /// Taken when `cond` holds.
        then_branch: Box<Self>,
        /// Taken otherwise.
        else_branch: Box<Self>,
    },

    /// Primitive operator application.
    Prim {
        /// The operator.
        op: PrimOp,
        /// Operands.
        args: Vec<Self>,
    },

    /// Function abstraction.
    Lambda {
        /// Parameter name.
        param: String,
        /// Declared parameter type.
        param_type: Type,
        /// Function body.
        body: Box<Self>,
    },

    /// Function application.
    Apply {
        /// The function.
        func: Box<Self>,
        /// The argument.
        arg: Box<Self>,
    },

    /// Singleton collection.
    Yield(Box<Self>),

    /// Empty collection of the given element type.
    Empty(Type),

    /// Bag union.
    Union(Box<Self>, Box<Self>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    // ========== Constructors ==========

    /// Create a constant.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    /// Create a variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Create a collection reference with an explicit row type.
    pub fn table(name: impl Into<String>, row: RecordType) -> Self {
        Self::Table {
            name: name.into(),
            row,
        }
    }

    /// Create a comprehension with an optional predicate.
    pub fn comprehension(
        source: Self,
        binder: impl Into<String>,
        predicate: Option<Self>,
        body: Self,
    ) -> Self {
        Self::For {
            source: Box::new(source),
            binder: binder.into(),
            predicate: predicate.map(Box::new),
            body: Box::new(body),
        }
    }

    /// Create a record.
    pub fn record<L: Into<String>>(fields: impl IntoIterator<Item = (L, Self)>) -> Self {
        Self::Record(fields.into_iter().map(|(l, t)| (l.into(), t)).collect())
    }

    /// Create a conditional.
    pub fn if_then_else(cond: Self, then_branch: Self, else_branch: Self) -> Self {
        Self::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    /// Create a primitive operator application.
    pub fn prim(op: PrimOp, args: Vec<Self>) -> Self {
        Self::Prim { op, args }
    }

    /// Create a function abstraction.
    pub fn lambda(param: impl Into<String>, param_type: Type, body: Self) -> Self {
        Self::Lambda {
            param: param.into(),
            param_type,
            body: Box::new(body),
        }
    }

    /// Create a singleton collection.
    pub fn singleton(element: Self) -> Self {
        Self::Yield(Box::new(element))
    }

    /// Create a bag union.
    pub fn union_all(left: Self, right: Self) -> Self {
        Self::Union(Box::new(left), Box::new(right))
    }

    // ========== Convenience builders ==========

    /// Project a field.
    #[must_use]
    pub fn field(self, label: impl Into<String>) -> Self {
        Self::Project {
            term: Box::new(self),
            label: label.into(),
        }
    }

    /// Apply this function to an argument.
    #[must_use]
    pub fn apply(self, arg: Self) -> Self {
        Self::Apply {
            func: Box::new(self),
            arg: Box::new(arg),
        }
    }

    fn binary(self, op: PrimOp, other: Self) -> Self {
        Self::prim(op, vec![self, other])
    }

    /// Create an AND expression.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.binary(PrimOp::And, other)
    }

    /// Create an OR expression.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.binary(PrimOp::Or, other)
    }

    /// Create a NOT expression.
    #[must_use]
    pub fn not(self) -> Self {
        Self::prim(PrimOp::Not, vec![self])
    }

    /// Create an equality expression.
    #[must_use]
    pub fn eq(self, other: Self) -> Self {
        self.binary(PrimOp::Eq, other)
    }

    /// Create an inequality expression.
    #[must_use]
    pub fn not_eq(self, other: Self) -> Self {
        self.binary(PrimOp::NotEq, other)
    }

    /// Create a less than expression.
    #[must_use]
    pub fn lt(self, other: Self) -> Self {
        self.binary(PrimOp::Lt, other)
    }

    /// Create a less than or equal expression.
    #[must_use]
    pub fn lt_eq(self, other: Self) -> Self {
        self.binary(PrimOp::LtEq, other)
    }

    /// Create a greater than expression.
    #[must_use]
    pub fn gt(self, other: Self) -> Self {
        self.binary(PrimOp::Gt, other)
    }

    /// Create a greater than or equal expression.
    #[must_use]
    pub fn gt_eq(self, other: Self) -> Self {
        self.binary(PrimOp::GtEq, other)
    }

    /// Create an addition expression.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        self.binary(PrimOp::Add, other)
    }

    /// Create a subtraction expression.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        self.binary(PrimOp::Subtract, other)
    }

    /// Create a multiplication expression.
    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        self.binary(PrimOp::Multiply, other)
    }

    /// Create a division expression.
    #[must_use]
    pub fn div(self, other: Self) -> Self {
        self.binary(PrimOp::Divide, other)
    }

    /// Create a modulo expression.
    #[must_use]
    pub fn modulo(self, other: Self) -> Self {
        self.binary(PrimOp::Modulo, other)
    }

    /// Create a string concatenation expression.
    #[must_use]
    pub fn concat(self, other: Self) -> Self {
        self.binary(PrimOp::Concat, other)
    }

    // ========== Analysis methods ==========

    /// Immediate sub-terms, left to right.
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Const(_) | Self::Var(_) | Self::Table { .. } | Self::Empty(_) => vec![],
            Self::For {
                source,
                predicate,
                body,
                ..
            } => {
                let mut out = vec![source.as_ref()];
                if let Some(p) = predicate {
                    out.push(p.as_ref());
                }
                out.push(body.as_ref());
                out
            }
            Self::Record(fields) => fields.iter().map(|(_, t)| t).collect(),
            Self::Project { term, .. } | Self::Yield(term) => vec![term.as_ref()],
            Self::If {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            Self::Prim { args, .. } => args.iter().collect(),
            Self::Lambda { body, .. } => vec![body.as_ref()],
            Self::Apply { func, arg } => vec![func.as_ref(), arg.as_ref()],
            Self::Union(l, r) => vec![l.as_ref(), r.as_ref()],
        }
    }

    /// Immediate sub-terms paired with the location segment that reaches
    /// them (`source`, `args[1]`, `fields[name]`, ...).
    pub fn labelled_children(&self) -> Vec<(String, &Self)> {
        match self {
            Self::For {
                source,
                predicate,
                body,
                ..
            } => {
                let mut out = vec![("source".to_string(), source.as_ref())];
                if let Some(p) = predicate {
                    out.push(("predicate".to_string(), p.as_ref()));
                }
                out.push(("body".to_string(), body.as_ref()));
                out
            }
            Self::Record(fields) => fields
                .iter()
                .map(|(l, t)| (format!("fields[{l}]"), t))
                .collect(),
            Self::Project { term, .. } => vec![("term".to_string(), term.as_ref())],
            Self::If {
                cond,
                then_branch,
                else_branch,
            } => vec![
                ("cond".to_string(), cond.as_ref()),
                ("then".to_string(), then_branch.as_ref()),
                ("else".to_string(), else_branch.as_ref()),
            ],
            Self::Prim { args, .. } => args
                .iter()
                .enumerate()
                .map(|(i, a)| (format!("args[{i}]"), a))
                .collect(),
            Self::Lambda { body, .. } => vec![("body".to_string(), body.as_ref())],
            Self::Apply { func, arg } => vec![
                ("func".to_string(), func.as_ref()),
                ("arg".to_string(), arg.as_ref()),
            ],
            Self::Yield(t) => vec![("element".to_string(), t.as_ref())],
            Self::Union(l, r) => vec![
                ("left".to_string(), l.as_ref()),
                ("right".to_string(), r.as_ref()),
            ],
            Self::Const(_) | Self::Var(_) | Self::Table { .. } | Self::Empty(_) => vec![],
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Self::size).sum::<usize>()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Self::depth)
            .max()
            .unwrap_or(0)
    }

    /// Whether any node satisfies the predicate.
    pub fn any(&self, pred: &impl Fn(&Self) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    /// Whether this term syntactically denotes a collection.
    ///
    /// Conditionals count when either branch does; variables, projections and
    /// applications are opaque and do not.
    pub fn is_collection_form(&self) -> bool {
        match self {
            Self::Table { .. }
            | Self::For { .. }
            | Self::Yield(_)
            | Self::Empty(_)
            | Self::Union(..) => true,
            Self::If {
                then_branch,
                else_branch,
                ..
            } => then_branch.is_collection_form() || else_branch.is_collection_form(),
            _ => false,
        }
    }

    /// Whether this is the empty collection.
    pub const fn is_empty_collection(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// The boolean constant, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Const(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Split a conjunction into its conjuncts, left to right.
    pub fn conjuncts(&self) -> Vec<&Self> {
        match self {
            Self::Prim {
                op: PrimOp::And,
                args,
            } if args.len() == 2 => {
                let mut out = args[0].conjuncts();
                out.extend(args[1].conjuncts());
                out
            }
            _ => vec![self],
        }
    }

    // ========== Rebuilding ==========

    /// Rebuild this node with every immediate child passed through `f`,
    /// left to right. Binder names are kept.
    pub fn map_children<F>(self, mut f: F) -> QuarryResult<Self>
    where
        F: FnMut(Self) -> QuarryResult<Self>,
    {
        Ok(match self {
            Self::Const(_) | Self::Var(_) | Self::Table { .. } | Self::Empty(_) => self,
            Self::For {
                source,
                binder,
                predicate,
                body,
            } => {
                let source = f(*source)?;
                let predicate = predicate.map(|p| f(*p)).transpose()?;
                let body = f(*body)?;
                Self::comprehension(source, binder, predicate, body)
            }
            Self::Record(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(l, t)| Ok((l, f(t)?)))
                    .collect::<QuarryResult<_>>()?,
            ),
            Self::Project { term, label } => f(*term)?.field(label),
            Self::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = f(*cond)?;
                let then_branch = f(*then_branch)?;
                let else_branch = f(*else_branch)?;
                Self::if_then_else(cond, then_branch, else_branch)
            }
            Self::Prim { op, args } => Self::Prim {
                op,
                args: args.into_iter().map(&mut f).collect::<QuarryResult<_>>()?,
            },
            Self::Lambda {
                param,
                param_type,
                body,
            } => Self::lambda(param, param_type, f(*body)?),
            Self::Apply { func, arg } => {
                let func = f(*func)?;
                let arg = f(*arg)?;
                func.apply(arg)
            }
            Self::Yield(t) => Self::singleton(f(*t)?),
            Self::Union(l, r) => {
                let l = f(*l)?;
                let r = f(*r)?;
                Self::union_all(l, r)
            }
        })
    }

    /// Post-order rewrite: children first (left to right), then `f` on the
    /// rebuilt node. Returns the new term and whether anything changed.
    pub fn transform_up<F>(self, f: &mut F) -> QuarryResult<(Self, bool)>
    where
        F: FnMut(Self) -> QuarryResult<(Self, bool)>,
    {
        let mut changed = false;
        let rebuilt = self.map_children(|child| {
            let (child, c) = child.transform_up(f)?;
            changed |= c;
            Ok(child)
        })?;
        let (result, c) = f(rebuilt)?;
        Ok((result, changed || c))
    }

    /// Render the term as an indented tree.
    pub fn explain(&self) -> String {
        DisplayTree::new(self).to_string()
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self,
            Self::Const(_)
                | Self::Var(_)
                | Self::Table { .. }
                | Self::Record(_)
                | Self::Project { .. }
                | Self::Empty(_)
                | Self::Apply { .. }
                | Self::Lambda { .. }
        ) || matches!(self, Self::Prim { op, args } if args.len() == 2 || matches!(op, PrimOp::Call(_)))
    }
}

/// Formats `term`, parenthesized unless it is atomic.
struct Atom<'a>(&'a Term);

impl fmt::Display for Atom<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_atomic() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v}"),
            Self::Var(name) => write!(f, "{name}"),
            Self::Table { name, .. } => write!(f, "{name}"),
            Self::For {
                source,
                binder,
                predicate,
                body,
            } => {
                write!(f, "for {binder} in {}", Atom(source))?;
                if let Some(p) = predicate {
                    write!(f, " where {p}")?;
                }
                write!(f, " do {body}")
            }
            Self::Record(fields) => {
                write!(f, "{{")?;
                for (i, (label, term)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label} = {term}")?;
                }
                write!(f, "}}")
            }
            Self::Project { term, label } => write!(f, "{}.{label}", Atom(term)),
            Self::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if {cond} then {then_branch} else {else_branch}"),
            Self::Prim { op, args } => match (op, args.as_slice()) {
                (PrimOp::Call(func), _) => {
                    let rendered = args
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "{}({rendered})", func.name)
                }
                (PrimOp::Not, [a]) => write!(f, "NOT {}", Atom(a)),
                (PrimOp::Negate, [a]) => write!(f, "-{}", Atom(a)),
                (_, [l, r]) => write!(f, "({} {op} {})", Atom(l), Atom(r)),
                _ => write!(f, "{op}(…)"),
            },
            Self::Lambda {
                param,
                param_type,
                body,
            } => write!(f, "(fun {param}: {param_type} -> {body})"),
            Self::Apply { func, arg } => write!(f, "{}({arg})", Atom(func)),
            Self::Yield(t) => write!(f, "yield {t}"),
            Self::Empty(_) => write!(f, "empty"),
            Self::Union(l, r) => write!(f, "{} union {}", Atom(l), Atom(r)),
        }
    }
}

impl TreeNode for Term {
    fn label(&self) -> String {
        match self {
            Self::Const(_) => "Const",
            Self::Var(_) => "Var",
            Self::Table { .. } => "Table",
            Self::For { .. } => "For",
            Self::Record(_) => "Record",
            Self::Project { .. } => "Project",
            Self::If { .. } => "If",
            Self::Prim { .. } => "Prim",
            Self::Lambda { .. } => "Lambda",
            Self::Apply { .. } => "Apply",
            Self::Yield(_) => "Yield",
            Self::Empty(_) => "Empty",
            Self::Union(..) => "Union",
        }
        .to_string()
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        Term::children(self)
            .into_iter()
            .map(|c| c as &dyn TreeNode)
            .collect()
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::Const(v) => Some(v.to_string()),
            Self::Var(name) | Self::Table { name, .. } => Some(name.clone()),
            Self::For { binder, .. } => Some(binder.clone()),
            Self::Record(fields) => Some(
                fields
                    .iter()
                    .map(|(l, _)| l.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Self::Project { label, .. } => Some(label.clone()),
            Self::Prim { op, .. } => Some(op.symbol().to_string()),
            Self::Lambda {
                param, param_type, ..
            } => Some(format!("{param}: {param_type}")),
            Self::Empty(ty) => Some(ty.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::DataType;

    fn people() -> Term {
        Term::table(
            "People",
            RecordType::new()
                .with_field("Name", DataType::String)
                .with_field("Age", DataType::Int64),
        )
    }

    fn adults() -> Term {
        Term::comprehension(
            people(),
            "u",
            Some(Term::var("u").field("Age").gt_eq(Term::constant(30i64))),
            Term::singleton(Term::record([("name", Term::var("u").field("Name"))])),
        )
    }

    #[test]
    fn test_display() {
        assert_eq!(
            adults().to_string(),
            "for u in People where (u.Age >= 30) do yield {name = u.Name}"
        );

        let lam = Term::lambda("x", Type::int(), Term::var("x").modulo(Term::constant(2i64)));
        assert_eq!(lam.to_string(), "(fun x: Int64 -> (x % 2))");
        assert_eq!(
            lam.apply(Term::constant(3i64)).to_string(),
            "(fun x: Int64 -> (x % 2))(3)"
        );
    }

    #[test]
    fn test_size_and_depth() {
        let t = adults();
        // For, Table, Prim, Project, Var, Const, Yield, Record, Project, Var
        assert_eq!(t.size(), 10);
        assert_eq!(t.depth(), 5);
    }

    #[test]
    fn test_collection_form() {
        assert!(adults().is_collection_form());
        assert!(people().is_collection_form());
        assert!(!Term::var("xs").is_collection_form());
        assert!(Term::if_then_else(
            Term::constant(true),
            Term::var("xs"),
            Term::Empty(Type::int())
        )
        .is_collection_form());
    }

    #[test]
    fn test_conjuncts() {
        let p = Term::var("a")
            .and(Term::var("b"))
            .and(Term::var("c").and(Term::var("d")));
        let names: Vec<String> = p.conjuncts().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_transform_up_is_post_order() {
        let t = Term::constant(1i64).add(Term::constant(2i64));
        let mut seen = Vec::new();
        let (_, changed) = t
            .transform_up(&mut |node| {
                seen.push(node.label());
                Ok((node, false))
            })
            .unwrap();
        assert!(!changed);
        assert_eq!(seen, vec!["Const", "Const", "Prim"]);
    }

    #[test]
    fn test_explain() {
        let explain = adults().explain();
        assert!(explain.starts_with("For (u)\n"));
        assert!(explain.contains("Table (People)"));
        assert!(explain.contains("Prim (>=)"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = adults();
        let json = serde_json::to_string(&t).unwrap();
        let back: Term = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
