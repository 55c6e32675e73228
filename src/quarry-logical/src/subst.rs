//! Free variables and capture-avoiding substitution.

use std::collections::BTreeSet;

use common_error::QuarryResult;

use crate::term::Term;

/// Free variables of a term.
///
/// A comprehension binder scopes over its predicate and body but not its
/// source; a lambda parameter scopes over its body.
pub fn free_vars(term: &Term) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free(term, &mut Vec::new(), &mut out);
    out
}

/// Whether `name` occurs free in `term`.
pub fn occurs_free(name: &str, term: &Term) -> bool {
    match term {
        Term::Var(v) => v == name,
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            occurs_free(name, source)
                || (binder != name
                    && (predicate.as_deref().is_some_and(|p| occurs_free(name, p))
                        || occurs_free(name, body)))
        }
        Term::Lambda { param, body, .. } => param != name && occurs_free(name, body),
        _ => term.children().into_iter().any(|c| occurs_free(name, c)),
    }
}

fn collect_free<'a>(term: &'a Term, bound: &mut Vec<&'a str>, out: &mut BTreeSet<String>) {
    match term {
        Term::Var(v) => {
            if !bound.contains(&v.as_str()) {
                out.insert(v.clone());
            }
        }
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            collect_free(source, bound, out);
            bound.push(binder);
            if let Some(p) = predicate {
                collect_free(p, bound, out);
            }
            collect_free(body, bound, out);
            bound.pop();
        }
        Term::Lambda { param, body, .. } => {
            bound.push(param);
            collect_free(body, bound, out);
            bound.pop();
        }
        _ => {
            for child in term.children() {
                collect_free(child, bound, out);
            }
        }
    }
}

/// A name derived from `base` that is not in `avoid`.
///
/// A trailing `_<digits>` suffix is stripped first, so renaming `u_1` again
/// yields `u_2` rather than `u_1_1`.
pub fn fresh_name(base: &str, avoid: &BTreeSet<String>) -> String {
    let stem = match base.rsplit_once('_') {
        Some((stem, digits))
            if !stem.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem
        }
        _ => base,
    };
    (1usize..)
        .map(|i| format!("{stem}_{i}"))
        .find(|candidate| !avoid.contains(candidate))
        .unwrap_or_else(|| format!("{stem}_"))
}

/// Replace free occurrences of `var` in `term` with `replacement`.
///
/// Binders in `term` that would capture a free variable of `replacement` are
/// renamed to fresh names first.
pub fn substitute(var: &str, replacement: &Term, term: Term) -> QuarryResult<Term> {
    let replacement_fv = free_vars(replacement);
    subst(var, replacement, &replacement_fv, term)
}

fn subst(
    var: &str,
    replacement: &Term,
    replacement_fv: &BTreeSet<String>,
    term: Term,
) -> QuarryResult<Term> {
    match term {
        Term::Var(ref name) if name == var => Ok(replacement.clone()),
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            let source = subst(var, replacement, replacement_fv, *source)?;
            let predicate = predicate.map(|p| *p);
            let body = *body;
            if binder == var {
                return Ok(Term::comprehension(source, binder, predicate, body));
            }

            let in_scope = predicate.as_ref().is_some_and(|p| occurs_free(var, p))
                || occurs_free(var, &body);
            if !in_scope {
                return Ok(Term::comprehension(source, binder, predicate, body));
            }

            let (binder, predicate, body) = if replacement_fv.contains(&binder) {
                let mut avoid = replacement_fv.clone();
                avoid.insert(var.to_string());
                if let Some(p) = &predicate {
                    avoid.extend(free_vars(p));
                }
                avoid.extend(free_vars(&body));
                let fresh = fresh_name(&binder, &avoid);
                log::trace!("renaming binder `{binder}` to `{fresh}` to avoid capture");
                let renamed = Term::var(fresh.as_str());
                let predicate = predicate
                    .map(|p| substitute(&binder, &renamed, p))
                    .transpose()?;
                let body = substitute(&binder, &renamed, body)?;
                (fresh, predicate, body)
            } else {
                (binder, predicate, body)
            };

            let predicate = predicate
                .map(|p| subst(var, replacement, replacement_fv, p))
                .transpose()?;
            let body = subst(var, replacement, replacement_fv, body)?;
            Ok(Term::comprehension(source, binder, predicate, body))
        }
        Term::Lambda {
            param,
            param_type,
            body,
        } => {
            if param == var || !occurs_free(var, &body) {
                return Ok(Term::Lambda {
                    param,
                    param_type,
                    body,
                });
            }

            let (param, body) = if replacement_fv.contains(&param) {
                let mut avoid = replacement_fv.clone();
                avoid.insert(var.to_string());
                avoid.extend(free_vars(&body));
                let fresh = fresh_name(&param, &avoid);
                log::trace!("renaming parameter `{param}` to `{fresh}` to avoid capture");
                let body = substitute(&param, &Term::var(fresh.as_str()), *body)?;
                (fresh, body)
            } else {
                (param, *body)
            };

            let body = subst(var, replacement, replacement_fv, body)?;
            Ok(Term::lambda(param, param_type, body))
        }
        other => other.map_children(|child| subst(var, replacement, replacement_fv, child)),
    }
}

/// Rename the variable bound by the outermost binder of `term` (a
/// comprehension or a lambda) to `new_name`.
///
/// `new_name` must not occur free in the binder's scope. Other terms are
/// returned unchanged.
pub fn rename_bound(term: Term, new_name: &str) -> QuarryResult<Term> {
    let renamed = Term::var(new_name);
    match term {
        Term::For {
            source,
            binder,
            predicate,
            body,
        } => {
            if binder == new_name {
                return Ok(Term::For {
                    source,
                    binder,
                    predicate,
                    body,
                });
            }
            let predicate = predicate
                .map(|p| substitute(&binder, &renamed, *p))
                .transpose()?;
            let body = substitute(&binder, &renamed, *body)?;
            Ok(Term::comprehension(*source, new_name, predicate, body))
        }
        Term::Lambda {
            param,
            param_type,
            body,
        } => {
            let body = substitute(&param, &renamed, *body)?;
            Ok(Term::lambda(new_name, param_type, body))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alpha::alpha_equals;
    use crate::term::{for_each, for_where, lambda, lit, var, yield_};
    use quarry_core::Type;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_free_vars() {
        // for x in xs where x = y do yield z
        let t = for_where(var("xs"), "x", var("x").eq(var("y")), yield_(var("z")));
        assert_eq!(free_vars(&t), names(&["xs", "y", "z"]));

        // the binder does not scope over its own source
        let t = for_each(var("x"), "x", yield_(var("x")));
        assert_eq!(free_vars(&t), names(&["x"]));

        let t = lambda("x", Type::int(), var("x").add(var("k")));
        assert_eq!(free_vars(&t), names(&["k"]));
    }

    #[test]
    fn test_fresh_name() {
        assert_eq!(fresh_name("u", &names(&[])), "u_1");
        assert_eq!(fresh_name("u", &names(&["u_1", "u_2"])), "u_3");
        assert_eq!(fresh_name("u_1", &names(&["u_1"])), "u_2");
        assert_eq!(fresh_name("_1", &names(&[])), "_1_1");
    }

    #[test]
    fn test_substitute_simple() {
        let t = var("x").add(lit(1i64));
        let out = substitute("x", &lit(41i64), t).unwrap();
        assert_eq!(out, lit(41i64).add(lit(1i64)));
    }

    #[test]
    fn test_substitute_respects_shadowing() {
        let t = for_each(var("x"), "x", yield_(var("x")));
        let out = substitute("x", &var("ys"), t).unwrap();
        assert_eq!(out, for_each(var("ys"), "x", yield_(var("x"))));
    }

    #[test]
    fn test_substitute_avoids_capture() {
        // (fun y -> x + y)[x := y]  must not capture the free y
        let t = lambda("y", Type::int(), var("x").add(var("y")));
        let out = substitute("x", &var("y"), t).unwrap();
        let expected = lambda("y_1", Type::int(), var("y").add(var("y_1")));
        assert_eq!(out, expected);

        // same for comprehension binders
        let t = for_where(var("xs"), "u", var("u").eq(var("s")), yield_(var("u")));
        let out = substitute("s", &var("u"), t).unwrap();
        let expected = for_where(var("xs"), "u_1", var("u_1").eq(var("u")), yield_(var("u_1")));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_rename_bound() {
        let t = for_where(var("xs"), "u", var("u").gt(lit(1i64)), yield_(var("u")));
        let out = rename_bound(t.clone(), "v").unwrap();
        assert_eq!(
            out,
            for_where(var("xs"), "v", var("v").gt(lit(1i64)), yield_(var("v")))
        );
        assert!(alpha_equals(&t, &out));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fresh_name_avoids_taken_names(
                base in "[a-z]{1,4}(_[0-9])?",
                avoid in prop::collection::btree_set("[a-z]{1,4}(_[0-9])?", 0..12)
            ) {
                let mut avoid = avoid;
                avoid.insert(base.clone());
                let fresh = fresh_name(&base, &avoid);
                prop_assert!(!avoid.contains(&fresh));
            }

            #[test]
            fn substituting_a_constant_closes_the_term(k in any::<i64>(), binder in "[a-z]{1,3}") {
                prop_assume!(binder != "y" && binder != "xs");
                let t = for_where(
                    var("xs"),
                    binder.clone(),
                    var(binder.clone()).eq(var("y")),
                    yield_(var("y")),
                );
                let out = substitute("y", &lit(k), t).unwrap();
                prop_assert_eq!(free_vars(&out), names(&["xs"]));
            }

            #[test]
            fn renaming_preserves_alpha_equivalence(fresh in "[a-z]{1,3}_[0-9]") {
                let t = for_where(var("xs"), "u", var("u").gt(var("k")), yield_(var("u")));
                let out = rename_bound(t.clone(), &fresh).unwrap();
                prop_assert!(alpha_equals(&t, &out));
            }
        }
    }
}
