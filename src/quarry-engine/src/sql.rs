//! SQL rendering of flat queries.
//!
//! Each [`FlatComprehension`] becomes one `SELECT … FROM … WHERE …` block
//! and branches are joined by `UNION ALL`. Shapes SQL has no column for
//! (nested records, functions, collections) are `NotImplemented`.

use common_error::{QuarryError, QuarryResult};
use quarry_core::Value;
use quarry_logical::{PrimOp, Term};
use quarry_optimizer::flatten::{FlatComprehension, FlatQuery};

/// SQL for the empty collection.
const EMPTY_SELECT: &str = "SELECT 1 WHERE 1 = 0";

/// Renders [`FlatQuery`] values as SQL text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlRenderer;

impl SqlRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a whole query.
    pub fn render(&self, query: &FlatQuery) -> QuarryResult<String> {
        if query.is_empty() {
            return Ok(EMPTY_SELECT.to_string());
        }
        let branches = query
            .branches
            .iter()
            .map(|b| self.render_branch(b))
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(branches.join("\nUNION ALL\n"))
    }

    /// Render a single select-from-where block.
    pub fn render_branch(&self, branch: &FlatComprehension) -> QuarryResult<String> {
        let mut sql = String::from("SELECT ");
        sql.push_str(&self.render_select(&branch.yield_, branch)?);

        if !branch.generators.is_empty() {
            let from = branch
                .generators
                .iter()
                .map(|g| format!("{} AS {}", ident(&g.table), ident(&g.binder)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" FROM {from}"));
        }

        if !branch.conditions.is_empty() {
            let conditions = branch
                .conditions
                .iter()
                .map(|c| self.render_expr(c))
                .collect::<QuarryResult<Vec<_>>>()?;
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }

        Ok(sql)
    }

    fn render_select(&self, element: &Term, branch: &FlatComprehension) -> QuarryResult<String> {
        match element {
            Term::Record(fields) if fields.is_empty() => Err(QuarryError::not_implemented(
                "SQL rendering of an empty record",
            )),
            Term::Record(fields) => {
                let columns = fields
                    .iter()
                    .map(|(label, value)| {
                        if matches!(value, Term::Record(_)) || is_row(value, branch) {
                            return Err(QuarryError::not_implemented(format!(
                                "SQL rendering of the record-valued column `{label}`"
                            )));
                        }
                        Ok(format!("{} AS {}", self.render_expr(value)?, ident(label)))
                    })
                    .collect::<QuarryResult<Vec<_>>>()?;
                Ok(columns.join(", "))
            }
            Term::Var(name) if is_row(element, branch) => Ok(format!("{}.*", ident(name))),
            other => Ok(format!("{} AS value", self.render_expr(other)?)),
        }
    }

    /// Render a scalar expression.
    pub fn render_expr(&self, term: &Term) -> QuarryResult<String> {
        match term {
            Term::Const(value) => Ok(literal(value)),

            Term::Project { term, label } => match term.as_ref() {
                Term::Var(row) => Ok(format!("{}.{}", ident(row), ident(label))),
                other => Err(QuarryError::not_implemented(format!(
                    "SQL rendering of a projection from {other}"
                ))),
            },

            Term::If {
                cond,
                then_branch,
                else_branch,
            } => Ok(format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                self.render_expr(cond)?,
                self.render_expr(then_branch)?,
                self.render_expr(else_branch)?
            )),

            Term::Prim { op, args } => {
                let rendered = args
                    .iter()
                    .map(|a| self.render_expr(a))
                    .collect::<QuarryResult<Vec<_>>>()?;
                match (op, rendered.as_slice()) {
                    (PrimOp::Call(func), _) => Ok(format!("{}({})", func.name, rendered.join(", "))),
                    (PrimOp::Not, [a]) => Ok(format!("NOT {a}")),
                    (PrimOp::Negate, [a]) => Ok(format!("-{a}")),
                    (op, [l, r]) => Ok(format!("({l} {} {r})", op.symbol())),
                    (op, _) => Err(QuarryError::invariant(format!(
                        "operator `{op}` with {} operands",
                        rendered.len()
                    ))),
                }
            }

            Term::Var(name) => Err(QuarryError::not_implemented(format!(
                "SQL rendering of the row variable `{name}` as a scalar"
            ))),

            other => Err(QuarryError::not_implemented(format!(
                "SQL rendering of {other}"
            ))),
        }
    }
}

/// Whether `term` names a whole generator row.
fn is_row(term: &Term, branch: &FlatComprehension) -> bool {
    matches!(term, Term::Var(name) if branch.generators.iter().any(|g| &g.binder == name))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Float64(f) if f.is_nan() => "CAST('NaN' AS DOUBLE PRECISION)".to_string(),
        Value::Float64(f) if f.is_infinite() => {
            let sign = if f.is_sign_negative() { "-" } else { "" };
            format!("CAST('{sign}Infinity' AS DOUBLE PRECISION)")
        }
        Value::Float64(f) => format!("{f:?}"),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

/// Keywords that cannot appear as bare identifiers.
const RESERVED: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CHECK", "COLUMN",
    "CONSTRAINT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE",
    "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "GRANT",
    "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT",
    "LIKE", "LIMIT", "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER",
    "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "TABLE", "THEN", "TO", "TRUE", "UNION",
    "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

/// Quote an identifier unless it is a plain word that is not reserved.
fn ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED.iter().any(|word| word.eq_ignore_ascii_case(name));
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{DataType, RecordType, Type};
    use quarry_logical::term::{empty, for_each, for_where, if_then_else, lit, record, union, var, yield_};
    use quarry_logical::HostFunction;
    use quarry_optimizer::flatten::flatten;

    fn people() -> Term {
        Term::table(
            "People",
            RecordType::new()
                .with_field("Name", DataType::String)
                .with_field("Age", DataType::Int64),
        )
    }

    fn render(term: &Term) -> QuarryResult<String> {
        let flat = flatten(term).unwrap().into_flat().unwrap();
        SqlRenderer::new().render(&flat)
    }

    #[test]
    fn test_select_from_where() {
        let q = for_where(
            people(),
            "u",
            var("u").field("Age").gt_eq(lit(30i64)),
            yield_(record([("name", var("u").field("Name"))])),
        );
        assert_eq!(
            render(&q).unwrap(),
            "SELECT u.Name AS name FROM People AS u WHERE (u.Age >= 30)"
        );
    }

    #[test]
    fn test_join_and_union() {
        let q = union(
            for_each(
                people(),
                "u",
                for_where(
                    people(),
                    "v",
                    var("u").field("Age").eq(var("v").field("Age")),
                    yield_(var("u").field("Name")),
                ),
            ),
            for_each(people(), "w", yield_(var("w").field("Name").concat(lit("'s")))),
        );
        assert_eq!(
            render(&q).unwrap(),
            "SELECT u.Name AS value FROM People AS u, People AS v WHERE (u.Age = v.Age)\n\
             UNION ALL\n\
             SELECT (w.Name || '''s') AS value FROM People AS w"
        );
    }

    #[test]
    fn test_whole_row() {
        let q = for_each(people(), "u", yield_(var("u")));
        assert_eq!(render(&q).unwrap(), "SELECT u.* FROM People AS u");
    }

    #[test]
    fn test_expressions() {
        let renderer = SqlRenderer::new();
        let lower = HostFunction::pure("lower", vec![DataType::String], DataType::String);
        let expr = if_then_else(
            lit(true).and(var("u").field("Age").not_eq(lit(1.5))),
            Term::prim(PrimOp::Call(lower), vec![var("u").field("Name")]),
            lit("x"),
        );
        assert_eq!(
            renderer.render_expr(&expr).unwrap(),
            "CASE WHEN (TRUE AND (u.Age <> 1.5)) THEN lower(u.Name) ELSE 'x' END"
        );
        assert_eq!(
            renderer.render_expr(&var("u").field("Age").not()).unwrap(),
            "NOT u.Age"
        );
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(render(&empty(Type::int())).unwrap(), EMPTY_SELECT);
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(ident("Age"), "Age");
        assert_eq!(ident("first name"), "\"first name\"");
        assert_eq!(ident("1st"), "\"1st\"");
        assert_eq!(ident("order"), "\"order\"");
        assert_eq!(ident("Select"), "\"Select\"");
    }

    #[test]
    fn test_reserved_binder_and_table() {
        let orders = Term::table("Order", RecordType::new().with_field("Id", DataType::Int64));
        let q = for_each(orders, "select", yield_(var("select").field("Id")));
        assert_eq!(
            render(&q).unwrap(),
            "SELECT \"select\".Id AS value FROM \"Order\" AS \"select\""
        );
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(literal(&Value::Float64(1.5)), "1.5");
        assert_eq!(
            literal(&Value::Float64(f64::NAN)),
            "CAST('NaN' AS DOUBLE PRECISION)"
        );
        assert_eq!(
            literal(&Value::Float64(f64::NEG_INFINITY)),
            "CAST('-Infinity' AS DOUBLE PRECISION)"
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        let nested = for_each(
            people(),
            "u",
            yield_(record([("inner", record([("a", lit(1i64))]))])),
        );
        let err = render(&nested).unwrap_err();
        assert!(matches!(err, QuarryError::NotImplemented(_)));

        let row_column = for_each(people(), "u", yield_(record([("row", var("u"))])));
        assert!(render(&row_column).is_err());
    }
}
