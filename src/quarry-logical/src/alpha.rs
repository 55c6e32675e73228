//! Alpha-equivalence.

use crate::term::Term;

/// Whether two terms are equal up to consistent renaming of bound variables.
pub fn alpha_equals(left: &Term, right: &Term) -> bool {
    alpha_equals_under(left, right, &[])
}

/// Like [`alpha_equals`], with `bindings` pairing variables already bound on
/// each side (outermost first).
pub fn alpha_equals_under(left: &Term, right: &Term, bindings: &[(String, String)]) -> bool {
    let mut scope: Vec<(&str, &str)> = bindings
        .iter()
        .map(|(l, r)| (l.as_str(), r.as_str()))
        .collect();
    equal(left, right, &mut scope)
}

fn var_equal(l: &str, r: &str, scope: &[(&str, &str)]) -> bool {
    // The innermost binder mentioning either name decides.
    match scope.iter().rev().find(|(bl, br)| *bl == l || *br == r) {
        Some((bl, br)) => *bl == l && *br == r,
        None => l == r,
    }
}

fn equal<'a>(left: &'a Term, right: &'a Term, scope: &mut Vec<(&'a str, &'a str)>) -> bool {
    match (left, right) {
        (Term::Const(a), Term::Const(b)) => a == b,
        (Term::Var(a), Term::Var(b)) => var_equal(a, b, scope),
        (Term::Table { name: a, row: ra }, Term::Table { name: b, row: rb }) => a == b && ra == rb,
        (
            Term::For {
                source: s1,
                binder: x1,
                predicate: p1,
                body: b1,
            },
            Term::For {
                source: s2,
                binder: x2,
                predicate: p2,
                body: b2,
            },
        ) => {
            if !equal(s1, s2, scope) {
                return false;
            }
            scope.push((x1.as_str(), x2.as_str()));
            let result = match (p1, p2) {
                (None, None) => true,
                (Some(p1), Some(p2)) => equal(p1, p2, scope),
                _ => false,
            } && equal(b1, b2, scope);
            scope.pop();
            result
        }
        (Term::Record(f1), Term::Record(f2)) => {
            f1.len() == f2.len()
                && f1
                    .iter()
                    .zip(f2)
                    .all(|((l1, t1), (l2, t2))| l1 == l2 && equal(t1, t2, scope))
        }
        (Term::Project { term: t1, label: l1 }, Term::Project { term: t2, label: l2 }) => {
            l1 == l2 && equal(t1, t2, scope)
        }
        (
            Term::If {
                cond: c1,
                then_branch: t1,
                else_branch: e1,
            },
            Term::If {
                cond: c2,
                then_branch: t2,
                else_branch: e2,
            },
        ) => equal(c1, c2, scope) && equal(t1, t2, scope) && equal(e1, e2, scope),
        (Term::Prim { op: o1, args: a1 }, Term::Prim { op: o2, args: a2 }) => {
            o1 == o2 && a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| equal(x, y, scope))
        }
        (
            Term::Lambda {
                param: x1,
                param_type: ty1,
                body: b1,
            },
            Term::Lambda {
                param: x2,
                param_type: ty2,
                body: b2,
            },
        ) => {
            if ty1 != ty2 {
                return false;
            }
            scope.push((x1.as_str(), x2.as_str()));
            let result = equal(b1, b2, scope);
            scope.pop();
            result
        }
        (Term::Apply { func: f1, arg: a1 }, Term::Apply { func: f2, arg: a2 }) => {
            equal(f1, f2, scope) && equal(a1, a2, scope)
        }
        (Term::Yield(a), Term::Yield(b)) => equal(a, b, scope),
        (Term::Empty(a), Term::Empty(b)) => a == b,
        (Term::Union(l1, r1), Term::Union(l2, r2)) => equal(l1, l2, scope) && equal(r1, r2, scope),
        _ => false,
    }
}

/// A structural rendering of `term` in which bound variables are replaced by
/// their binding depth.
///
/// Two terms have the same key exactly when they are alpha-equivalent, so the
/// key gives a total order on terms that is stable under renaming.
pub fn canonical_key(term: &Term) -> String {
    let mut out = String::new();
    write_key(term, &mut Vec::new(), &mut out);
    out
}

fn write_key<'a>(term: &'a Term, bound: &mut Vec<&'a str>, out: &mut String) {
    match term {
        Term::Const(v) => out.push_str(&format!("Const({v:?})")),
        Term::Var(name) => match bound.iter().rposition(|b| *b == name.as_str()) {
            Some(level) => out.push_str(&format!("#{level}")),
            None => out.push_str(&format!("Var({name})")),
        },
        Term::Table { name, row } => out.push_str(&format!("Table({name}:{row})")),
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            out.push_str("For(");
            write_key(source, bound, out);
            bound.push(binder);
            if let Some(p) = predicate {
                out.push_str(",where ");
                write_key(p, bound, out);
            }
            out.push(',');
            write_key(body, bound, out);
            bound.pop();
            out.push(')');
        }
        Term::Lambda {
            param,
            param_type,
            body,
        } => {
            out.push_str(&format!("Lambda({param_type},"));
            bound.push(param);
            write_key(body, bound, out);
            bound.pop();
            out.push(')');
        }
        Term::Record(fields) => {
            out.push_str("Record(");
            for (label, field) in fields {
                out.push_str(&format!("{label}="));
                write_key(field, bound, out);
                out.push(',');
            }
            out.push(')');
        }
        Term::Project { term, label } => {
            out.push_str("Project(");
            write_key(term, bound, out);
            out.push_str(&format!(".{label})"));
        }
        Term::Prim { op, args } => {
            out.push_str(&format!("Prim({op:?}"));
            for arg in args {
                out.push(',');
                write_key(arg, bound, out);
            }
            out.push(')');
        }
        Term::Empty(ty) => out.push_str(&format!("Empty({ty})")),
        Term::If { .. } | Term::Apply { .. } | Term::Yield(_) | Term::Union(..) => {
            out.push_str(tag(term));
            out.push('(');
            for (i, child) in term.children().into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_key(child, bound, out);
            }
            out.push(')');
        }
    }
}

fn tag(term: &Term) -> &'static str {
    match term {
        Term::If { .. } => "If",
        Term::Apply { .. } => "Apply",
        Term::Yield(_) => "Yield",
        _ => "Union",
    }
}
