//! Flat query shapes produced by the flattener.

use std::fmt;

use common_display::indent;
use quarry_core::RecordType;
use quarry_logical::{alpha_equals_under, Term};
use serde::{Deserialize, Serialize};

/// One generator of a flat comprehension: `binder in table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    /// Variable bound to each row.
    pub binder: String,
    /// Catalog collection name.
    pub table: String,
    /// Row type of the collection.
    pub row: RecordType,
}

impl Generator {
    pub fn new(binder: impl Into<String>, table: impl Into<String>, row: RecordType) -> Self {
        Self {
            binder: binder.into(),
            table: table.into(),
            row,
        }
    }
}

/// A single select-from-where block.
///
/// Produces one copy of `yield_` for every combination of generator rows
/// satisfying all `conditions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatComprehension {
    /// Generators in nesting order (outermost first).
    pub generators: Vec<Generator>,
    /// Conjuncts of every predicate and guard, in generator order.
    pub conditions: Vec<Term>,
    /// The element produced per match.
    pub yield_: Term,
}

impl FlatComprehension {
    /// Binder names, outermost first.
    pub fn binders(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.binder.as_str()).collect()
    }

    /// Equality up to a positional renaming of generator binders.
    pub fn alpha_equals(&self, other: &Self) -> bool {
        self.alpha_equals_under(other, &[])
    }

    pub(crate) fn alpha_equals_under(&self, other: &Self, outer: &[(String, String)]) -> bool {
        if self.generators.len() != other.generators.len()
            || self.conditions.len() != other.conditions.len()
        {
            return false;
        }

        let mut bindings = outer.to_vec();
        for (l, r) in self.generators.iter().zip(&other.generators) {
            if l.table != r.table || l.row != r.row {
                return false;
            }
            bindings.push((l.binder.clone(), r.binder.clone()));
        }

        self.conditions
            .iter()
            .zip(&other.conditions)
            .all(|(l, r)| alpha_equals_under(l, r, &bindings))
            && alpha_equals_under(&self.yield_, &other.yield_, &bindings)
    }
}

impl fmt::Display for FlatComprehension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.generators.is_empty() {
            let generators = self
                .generators
                .iter()
                .map(|g| format!("{} in {}", g.binder, g.table))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "for {generators} ")?;
        }
        if !self.conditions.is_empty() {
            let conditions = self
                .conditions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" AND ");
            write!(f, "where {conditions} ")?;
        }
        write!(f, "yield {}", self.yield_)
    }
}

/// A bag union of flat comprehensions, directly translatable to one
/// relational-algebra expression. No branches means the empty collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatQuery {
    pub branches: Vec<FlatComprehension>,
}

impl FlatQuery {
    pub fn new(branches: Vec<FlatComprehension>) -> Self {
        Self { branches }
    }

    /// Number of union branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Branch-wise [`FlatComprehension::alpha_equals`].
    pub fn alpha_equals(&self, other: &Self) -> bool {
        self.branches.len() == other.branches.len()
            && self
                .branches
                .iter()
                .zip(&other.branches)
                .all(|(l, r)| l.alpha_equals(r))
    }
}

impl fmt::Display for FlatQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.branches.is_empty() {
            return write!(f, "empty");
        }
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f, "union all")?;
            }
            write!(f, "{branch}")?;
        }
        Ok(())
    }
}

/// One step into a yielded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Field label.
    pub label: String,
    /// Position of the field in the record before nested fields were removed.
    pub index: usize,
}

impl PathSegment {
    pub fn new(label: impl Into<String>, index: usize) -> Self {
        Self {
            label: label.into(),
            index,
        }
    }
}

/// A collection-valued part of a yield, computed by its own query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedField {
    /// Record fields leading from the yielded element to the collection.
    /// Empty when the element itself is the collection.
    pub path: Vec<PathSegment>,
    /// The query computing the collection, correlated with the binders of
    /// the enclosing branch.
    pub subquery: QueryTree,
}

/// One branch of a [`QueryTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeBranch {
    /// The branch with every nested collection removed from its yield.
    pub comprehension: FlatComprehension,
    /// Collections to compute per result row and put back at their paths.
    pub nested: Vec<NestedField>,
}

/// A query whose results contain collections: a flat query per nesting
/// level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTree {
    pub branches: Vec<TreeBranch>,
}

impl QueryTree {
    /// Whether no branch carries a nested collection.
    pub fn is_flat(&self) -> bool {
        self.branches.iter().all(|b| b.nested.is_empty())
    }

    /// The flat query, if this tree has no nested collections.
    pub fn into_flat(self) -> Option<FlatQuery> {
        if !self.is_flat() {
            return None;
        }
        Some(FlatQuery::new(
            self.branches.into_iter().map(|b| b.comprehension).collect(),
        ))
    }

    /// Number of query levels, 1 for a flat query.
    pub fn depth(&self) -> usize {
        1 + self
            .branches
            .iter()
            .flat_map(|b| &b.nested)
            .map(|n| n.subquery.depth())
            .max()
            .unwrap_or(0)
    }

    /// Equality up to positional renaming of binders, at every level.
    pub fn alpha_equals(&self, other: &Self) -> bool {
        self.alpha_equals_under(other, &[])
    }

    fn alpha_equals_under(&self, other: &Self, outer: &[(String, String)]) -> bool {
        self.branches.len() == other.branches.len()
            && self.branches.iter().zip(&other.branches).all(|(l, r)| {
                if !l.comprehension.alpha_equals_under(&r.comprehension, outer)
                    || l.nested.len() != r.nested.len()
                {
                    return false;
                }
                let mut bindings = outer.to_vec();
                bindings.extend(
                    l.comprehension
                        .binders()
                        .into_iter()
                        .zip(r.comprehension.binders())
                        .map(|(a, b)| (a.to_string(), b.to_string())),
                );
                l.nested.iter().zip(&r.nested).all(|(a, b)| {
                    a.path == b.path && a.subquery.alpha_equals_under(&b.subquery, &bindings)
                })
            })
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.branches.is_empty() {
            return write!(f, "empty");
        }
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f, "union all")?;
            }
            write!(f, "{}", branch.comprehension)?;
            for field in &branch.nested {
                let path = if field.path.is_empty() {
                    "<element>".to_string()
                } else {
                    field
                        .path
                        .iter()
                        .map(|s| s.label.as_str())
                        .collect::<Vec<_>>()
                        .join(".")
                };
                writeln!(f)?;
                writeln!(f, "  with {path} =")?;
                write!(f, "{}", indent(&field.subquery.to_string(), "    "))?;
            }
        }
        Ok(())
    }
}

/// The executable shape of a normal-form query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Flattened {
    /// No yielded element contains a collection.
    Flat(FlatQuery),
    /// Some yielded element contains a collection.
    Nested(QueryTree),
}

impl Flattened {
    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Flat(_))
    }

    pub fn as_flat(&self) -> Option<&FlatQuery> {
        match self {
            Self::Flat(query) => Some(query),
            Self::Nested(_) => None,
        }
    }

    pub fn into_flat(self) -> Option<FlatQuery> {
        match self {
            Self::Flat(query) => Some(query),
            Self::Nested(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&QueryTree> {
        match self {
            Self::Nested(tree) => Some(tree),
            Self::Flat(_) => None,
        }
    }
}

impl fmt::Display for Flattened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat(query) => write!(f, "{query}"),
            Self::Nested(tree) => write!(f, "{tree}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::DataType;
    use quarry_logical::term::{lit, record, var};

    fn people_row() -> RecordType {
        RecordType::new()
            .with_field("Name", DataType::String)
            .with_field("Age", DataType::Int64)
    }

    fn adults(binder: &str) -> FlatComprehension {
        FlatComprehension {
            generators: vec![Generator::new(binder, "People", people_row())],
            conditions: vec![var(binder).field("Age").gt_eq(lit(30i64))],
            yield_: record([("name", var(binder).field("Name"))]),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            adults("u").to_string(),
            "for u in People where (u.Age >= 30) yield {name = u.Name}"
        );

        let query = FlatQuery::new(vec![adults("u"), adults("v")]);
        assert_eq!(
            query.to_string(),
            "for u in People where (u.Age >= 30) yield {name = u.Name}\n\
             union all\n\
             for v in People where (v.Age >= 30) yield {name = v.Name}"
        );
        assert_eq!(FlatQuery::default().to_string(), "empty");
    }

    #[test]
    fn test_alpha_equals_positional() {
        assert!(adults("u").alpha_equals(&adults("v")));

        let mut other = adults("v");
        other.generators[0].table = "Staff".to_string();
        assert!(!adults("u").alpha_equals(&other));

        let mut other = adults("v");
        other.conditions.clear();
        assert!(!adults("u").alpha_equals(&other));
    }

    #[test]
    fn test_tree_into_flat() {
        let tree = QueryTree {
            branches: vec![TreeBranch {
                comprehension: adults("u"),
                nested: vec![],
            }],
        };
        assert!(tree.is_flat());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.into_flat().map(|q| q.len()), Some(1));
    }

    #[test]
    fn test_nested_tree_alpha_equals() {
        let nested = |outer: &str, inner: &str| QueryTree {
            branches: vec![TreeBranch {
                comprehension: adults(outer),
                nested: vec![NestedField {
                    path: vec![PathSegment::new("peers", 1)],
                    subquery: QueryTree {
                        branches: vec![TreeBranch {
                            comprehension: FlatComprehension {
                                generators: vec![Generator::new(inner, "People", people_row())],
                                conditions: vec![var(inner).field("Age").eq(var(outer).field("Age"))],
                                yield_: var(inner).field("Name"),
                            },
                            nested: vec![],
                        }],
                    },
                }],
            }],
        };

        let tree = nested("u", "v");
        assert!(!tree.is_flat());
        assert_eq!(tree.depth(), 2);
        assert!(tree.alpha_equals(&nested("a", "b")));
        assert!(tree.clone().into_flat().is_none());
        assert!(tree.to_string().contains("  with peers =\n    for v in People"));
    }

    #[test]
    fn test_flat_query_json_roundtrip() {
        let query = FlatQuery::new(vec![adults("u")]);
        let json = serde_json::to_string(&query).unwrap();
        let back: FlatQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }
}
