//! Nullability and first-name analysis.
//!
//! A fixed-point walk over the grammar, grounded on `original_source/ast/ast.go`'s
//! `NullableVisit`/`InitialNames` methods on each expression kind. The `visited` marker on
//! a [`Rule`] lets a rule that is mid-computation (possibly because it's part of a
//! left-recursive cycle) be treated as non-nullable rather than recursing forever; this
//! keeps the walk sound even before [`crate::leftrec`] has classified anything.

use crate::ast::{Expr, Grammar, Rule};

/// Run the nullability/first-name fixed point over every rule in `g`, writing results into
/// each [`Rule`]'s `nullable` cell. Must run before [`crate::leftrec::classify`], which
/// consumes the first-name edges this computes.
pub fn analyze(g: &Grammar) {
    for rule in &g.rules {
        rule.visited.set(false);
    }
    for rule in &g.rules {
        nullable_visit(g, rule);
    }
}

fn rule_by_name<'g>(g: &'g Grammar, name: &str) -> Option<&'g Rule> {
    g.rule_index(name).map(|i| &g.rules[i])
}

/// Is `rule` nullable? Computes and caches on first visit; a rule found still `visited`
/// (i.e. on the call stack) is treated as non-nullable, matching the reference
/// implementation's loop-guard behavior.
fn nullable_visit(g: &Grammar, rule: &Rule) -> bool {
    if rule.visited.get() {
        return rule.nullable.get();
    }
    rule.visited.set(true);
    let n = expr_nullable(g, &rule.expr);
    rule.nullable.set(n);
    n
}

pub(crate) fn expr_nullable(g: &Grammar, e: &Expr) -> bool {
    match e {
        Expr::Choice(alts) => alts.iter().any(|a| expr_nullable(g, a)),
        Expr::Sequence(parts) => parts.iter().all(|p| expr_nullable(g, p)),
        Expr::Labeled { expr, .. } => expr_nullable(g, expr),
        Expr::And(_) | Expr::Not(_) => true,
        Expr::ZeroOrOne(_) | Expr::ZeroOrMore(_) => true,
        Expr::OneOrMore(inner) => expr_nullable(g, inner),
        Expr::RuleRef(name) => match rule_by_name(g, name) {
            Some(r) => nullable_visit(g, r),
            None => false,
        },
        Expr::Lit { val, .. } => val.is_empty(),
        Expr::CharClass(cc) => cc.is_empty_class(),
        Expr::Any => false,
        Expr::Action { expr, .. } => expr_nullable(g, expr),
        Expr::Code(_) => true,
        Expr::Throw(_) => true,
        Expr::Recovery { expr, recover_expr, .. } => {
            expr_nullable(g, expr) || expr_nullable(g, recover_expr)
        }
    }
}

/// First-name set: the set of rule names an expression may consult *without first
/// consuming input*, used to build the left-recursion edge graph. Computed fresh per rule
/// rather than cached, since it is only needed once (by [`crate::leftrec`]).
pub fn first_names(g: &Grammar, e: &Expr) -> Vec<String> {
    let mut out = Vec::new();
    collect_first_names(g, e, &mut out);
    out
}

fn collect_first_names(g: &Grammar, e: &Expr, out: &mut Vec<String>) {
    match e {
        Expr::Choice(alts) => {
            for a in alts {
                collect_first_names(g, a, out);
            }
        }
        Expr::Sequence(parts) => {
            for p in parts {
                collect_first_names(g, p, out);
                if !expr_nullable(g, p) {
                    break;
                }
            }
        }
        Expr::Labeled { expr, .. } => collect_first_names(g, expr, out),
        Expr::And(_) | Expr::Not(_) => {}
        Expr::ZeroOrOne(inner) | Expr::ZeroOrMore(inner) | Expr::OneOrMore(inner) => {
            collect_first_names(g, inner, out)
        }
        Expr::RuleRef(name) => out.push(name.clone()),
        Expr::Lit { .. } | Expr::CharClass(_) | Expr::Any => {}
        Expr::Action { expr, .. } => collect_first_names(g, expr, out),
        Expr::Code(_) | Expr::Throw(_) => {}
        Expr::Recovery { expr, recover_expr, .. } => {
            collect_first_names(g, expr, out);
            collect_first_names(g, recover_expr, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Grammar, Rule};

    #[test]
    fn empty_literal_is_nullable() {
        let g = Grammar::new(vec![Rule::new("r", Expr::lit(""))]);
        analyze(&g);
        assert!(g.rules[0].is_nullable());
    }

    #[test]
    fn nonempty_literal_is_not_nullable() {
        let g = Grammar::new(vec![Rule::new("r", Expr::lit("x"))]);
        analyze(&g);
        assert!(!g.rules[0].is_nullable());
    }

    #[test]
    fn sequence_nullable_iff_all_parts_nullable() {
        let g = Grammar::new(vec![Rule::new(
            "r",
            Expr::Sequence(vec![Expr::lit(""), Expr::lit("x")]),
        )]);
        analyze(&g);
        assert!(!g.rules[0].is_nullable());
    }

    #[test]
    fn choice_nullable_if_any_alt_nullable() {
        let g = Grammar::new(vec![Rule::new(
            "r",
            Expr::Choice(vec![Expr::lit("x"), Expr::lit("")]),
        )]);
        analyze(&g);
        assert!(g.rules[0].is_nullable());
    }

    #[test]
    fn zero_or_more_always_nullable() {
        let g = Grammar::new(vec![Rule::new("r", Expr::ZeroOrMore(Box::new(Expr::lit("x"))))]);
        analyze(&g);
        assert!(g.rules[0].is_nullable());
    }

    #[test]
    fn rule_ref_defers_to_target_rule() {
        let g = Grammar::new(vec![
            Rule::new("a", Expr::rule_ref("b")),
            Rule::new("b", Expr::lit("")),
        ]);
        analyze(&g);
        assert!(g.rules[0].is_nullable());
    }

    #[test]
    fn sequence_first_names_stop_at_first_non_nullable() {
        let g = Grammar::new(vec![Rule::new(
            "r",
            Expr::Sequence(vec![Expr::rule_ref("a"), Expr::rule_ref("b")]),
        )]);
        let names = first_names(&g, &g.rules[0].expr);
        assert_eq!(names, vec!["a".to_string()]);
    }
}
