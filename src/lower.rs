//! Lowering: turns an analyzed [`ast::Grammar`] into a [`LoweredGrammar`] of dense
//! [`NodeId`]/[`RuleId`]-addressed nodes that [`crate::interp`] executes directly, without
//! touching strings or rule names at parse time.
//!
//! Must run after [`crate::analyze::analyze`] and [`crate::leftrec::classify`] have
//! populated each rule's annotation cells.

use rustc_hash::FxHashMap;

use crate::analyze::expr_nullable;
use crate::ast::{self, ActionFn, CodeFn, Expr, Grammar};
use crate::charclass::CharClass;
use crate::errors::PegError;
use crate::ids::{NodeId, RuleId};

pub struct LoweredGrammar {
    pub rules: Vec<LRule>,
    pub nodes: Vec<LNode>,
}

impl LoweredGrammar {
    pub fn rule_index(&self, name: &str) -> Option<RuleId> {
        self.rules.iter().find(|r| r.name == name).map(|r| r.id)
    }

    pub fn node(&self, id: NodeId) -> &LNode {
        &self.nodes[id.0 as usize]
    }

    pub fn rule(&self, id: RuleId) -> &LRule {
        &self.rules[id.0 as usize]
    }
}

pub struct LRule {
    pub id: RuleId,
    pub name: String,
    pub display_name: String,
    pub body: NodeId,
    pub nullable: bool,
    pub left_recursive: bool,
    pub leader: bool,
}

pub struct LNode {
    pub id: NodeId,
    pub kind: LExprKind,
}

pub enum LExprKind {
    Choice(Vec<NodeId>),
    Sequence(Vec<NodeId>),
    Labeled { label: String, expr: NodeId, text_capture: bool },
    And(NodeId),
    Not(NodeId),
    ZeroOrOne(NodeId),
    ZeroOrMore(NodeId),
    OneOrMore(NodeId),
    RuleRef(RuleId),
    Lit { val: String, ignore_case: bool },
    CharClass(CharClass),
    Any,
    Action { expr: NodeId, run: ActionFn },
    Code(CodeFn),
    Throw(String),
    Recovery { expr: NodeId, recover_expr: NodeId, labels: Vec<String> },
}

/// Consume an analyzed, classified grammar and produce its lowered form. Fails with
/// [`PegError::EmptyGrammar`] / [`PegError::UndefinedRule`] if the grammar is structurally
/// invalid; these are grammar-authoring errors caught once at load time, not per-parse data
/// errors, so unlike the interpreter's own failures they are reported eagerly here.
pub fn lower(g: Grammar) -> Result<LoweredGrammar, PegError> {
    if g.rules.is_empty() {
        return Err(PegError::EmptyGrammar);
    }

    let rule_ids: FxHashMap<String, RuleId> = g
        .rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), RuleId(i as u32)))
        .collect();

    let mut nodes = Vec::new();
    let mut rules = Vec::with_capacity(g.rules.len());

    for (i, rule) in g.rules.into_iter().enumerate() {
        let display_name = rule.display().to_string();
        let nullable = rule.is_nullable();
        let left_recursive = rule.is_left_recursive();
        let leader = rule.is_leader();
        let body = lower_into(rule.expr, &rule_ids, &mut nodes)?;
        rules.push(LRule {
            id: RuleId(i as u32),
            name: rule.name,
            display_name,
            body,
            nullable,
            left_recursive,
            leader,
        });
    }

    Ok(LoweredGrammar { rules, nodes })
}

fn push_node(arena: &mut Vec<LNode>, kind: LExprKind) -> NodeId {
    let id = NodeId(arena.len() as u32);
    arena.push(LNode { id, kind });
    id
}

fn lower_into(
    expr: Expr,
    rule_ids: &FxHashMap<String, RuleId>,
    arena: &mut Vec<LNode>,
) -> Result<NodeId, PegError> {
    let kind = match expr {
        Expr::Choice(alts) => {
            let ids = alts
                .into_iter()
                .map(|a| lower_into(a, rule_ids, arena))
                .collect::<Result<Vec<_>, _>>()?;
            LExprKind::Choice(ids)
        }
        Expr::Sequence(parts) => {
            let ids = parts
                .into_iter()
                .map(|p| lower_into(p, rule_ids, arena))
                .collect::<Result<Vec<_>, _>>()?;
            LExprKind::Sequence(ids)
        }
        Expr::Labeled { label, expr, text_capture } => {
            let id = lower_into(*expr, rule_ids, arena)?;
            LExprKind::Labeled { label, expr: id, text_capture }
        }
        Expr::And(inner) => LExprKind::And(lower_into(*inner, rule_ids, arena)?),
        Expr::Not(inner) => LExprKind::Not(lower_into(*inner, rule_ids, arena)?),
        Expr::ZeroOrOne(inner) => LExprKind::ZeroOrOne(lower_into(*inner, rule_ids, arena)?),
        Expr::ZeroOrMore(inner) => {
            warn_if_nullable_repeat(&inner, "a `*` repetition");
            LExprKind::ZeroOrMore(lower_into(*inner, rule_ids, arena)?)
        }
        Expr::OneOrMore(inner) => {
            warn_if_nullable_repeat(&inner, "a `+` repetition");
            LExprKind::OneOrMore(lower_into(*inner, rule_ids, arena)?)
        }
        Expr::RuleRef(name) => {
            let id = rule_ids
                .get(&name)
                .copied()
                .ok_or_else(|| PegError::UndefinedRule(name.clone()))?;
            LExprKind::RuleRef(id)
        }
        Expr::Lit { val, ignore_case } => LExprKind::Lit { val, ignore_case },
        Expr::CharClass(cc) => LExprKind::CharClass(cc),
        Expr::Any => LExprKind::Any,
        Expr::Action { expr, run } => {
            let id = lower_into(*expr, rule_ids, arena)?;
            LExprKind::Action { expr: id, run }
        }
        Expr::Code(f) => LExprKind::Code(f),
        Expr::Throw(label) => LExprKind::Throw(label),
        Expr::Recovery { expr, recover_expr, labels } => {
            let expr_id = lower_into(*expr, rule_ids, arena)?;
            let recover_id = lower_into(*recover_expr, rule_ids, arena)?;
            LExprKind::Recovery { expr: expr_id, recover_expr: recover_id, labels }
        }
    };
    Ok(push_node(arena, kind))
}

/// The analyzer computes nullability per *rule*, not per arbitrary sub-expression, but a
/// repetition's immediate body can still be checked standalone: if it can match the empty
/// string with no further rule context, a naive packrat loop over it never observes
/// failure and never terminates. This is a lint, not a rejection or behavior change (see
/// design notes); it fires at lowering time, once per grammar load.
fn warn_if_nullable_repeat(inner: &Expr, what: &str) {
    // An empty, rule-free `Grammar` is enough context: repetition bodies that reference
    // rules are checked too, but an unresolved `RuleRef` is conservatively treated as
    // non-nullable by `expr_nullable`, so this can only under-warn, never false-positive
    // on a rule whose own nullability isn't known here.
    let empty = ast::Grammar::new(Vec::new());
    if expr_nullable(&empty, inner) {
        log::warn!(
            target: "pegrat::lower",
            "{} has a nullable body and will never terminate at parse time",
            what
        );
    }
}
