//! The backtracking interpreter: executes a [`LoweredGrammar`] against input bytes.
//!
//! Directly mirrors the reference implementation's `parseExpr`/`parseChoiceExpr`/
//! `parseSeqExpr`/.../`parseRuleWrap` dispatch family, one `LExprKind` variant per
//! `parse*Expr` method there. Control flow never panics internally: every evaluator
//! returns [`EvalResult`], an explicit carrier for the PEG match flag (`Ok((_, false))`
//! is an ordinary failure, not an error) alongside a `Fatal` channel reserved for the
//! expression-count cap.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{ActionFn, CodeFn, Context};
use crate::cursor::{Cursor, Position};
use crate::errors::{ErrorList, FarthestFailure, ParseError};
use crate::ids::{NodeId, RuleId};
use crate::lower::{LExprKind, LRule, LoweredGrammar};
use crate::memo::{MemoEntry, MemoTable};
use crate::options::ResolvedOptions;
use crate::state::{GlobalStore, RecoveryStack, StateStore, VarStack};
use crate::stats::Stats;
use crate::value::{unit, value, Value};

/// Why an expression evaluation aborted outright rather than simply failing to match.
#[derive(Debug)]
pub enum Fatal {
    MaxExpressions(usize),
}

/// `Ok((value, matched))` on ordinary completion (a PEG failure is `matched == false`, not
/// an `Err`); `Err(Fatal)` only for the expression-count cap.
pub type EvalResult = Result<(Value, bool), Fatal>;

pub struct Interp<'g> {
    lowered: &'g LoweredGrammar,
    cursor: Cursor<'g>,
    state: StateStore,
    global_store: GlobalStore,
    vars: VarStack,
    memo: MemoTable,
    recovery: RecoveryStack,
    rule_stack: Vec<String>,
    expr_cnt: usize,
    farthest: FarthestFailure,
    errors: ErrorList,
    stats: Option<Stats>,
    opts: &'g ResolvedOptions,
    /// Body `NodeId`s of every left-recursive rule (leader or not): these are excluded
    /// from the generic per-node memo so the leader's seed-growing and the non-leader
    /// direct path both see fresh evaluations, per SPEC_FULL.md §4.3.
    left_recursive_bodies: FxHashSet<NodeId>,
}

impl<'g> Interp<'g> {
    pub fn new(lowered: &'g LoweredGrammar, data: &'g [u8], opts: &'g ResolvedOptions) -> Self {
        let mut state = StateStore::new();
        for (k, v) in &opts.init_state_seed {
            state.set(k.clone(), v.clone());
        }
        let mut global_store: GlobalStore = FxHashMap::default();
        for (k, v) in &opts.global_store_seed {
            global_store.insert(k.clone(), v.clone());
        }
        let left_recursive_bodies = lowered
            .rules
            .iter()
            .filter(|r| r.left_recursive)
            .map(|r| r.body)
            .collect();

        Interp {
            lowered,
            cursor: Cursor::new(data),
            state,
            global_store,
            vars: VarStack::new(),
            memo: MemoTable::new(),
            recovery: RecoveryStack::new(),
            rule_stack: Vec::new(),
            expr_cnt: 0,
            farthest: FarthestFailure::new(),
            errors: ErrorList::new(),
            stats: if opts.statistics { Some(Stats::new()) } else { None },
            opts,
            left_recursive_bodies,
        }
    }

    pub fn run(&mut self, entry: RuleId) -> EvalResult {
        self.eval_rule(entry)
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn farthest(&self) -> &FarthestFailure {
        &self.farthest
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn expr_cnt(&self) -> usize {
        self.expr_cnt
    }

    fn with_var_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.vars.push();
        let r = f(self);
        self.vars.pop();
        r
    }

    fn with_recovery(
        &mut self,
        labels: &[String],
        recover_expr: NodeId,
        f: impl FnOnce(&mut Self) -> EvalResult,
    ) -> EvalResult {
        self.recovery.push(labels, recover_expr);
        let r = f(self);
        self.recovery.pop();
        r
    }

    fn record_fail(&mut self, pos: Position, want: impl Into<String>) {
        self.farthest.fail_at(pos, want);
    }

    /// Advance the cursor past the current rune, recording an `invalid encoding` error if
    /// it was an invalid UTF-8 byte and `AllowInvalidUtf8` is off. Matching still proceeds
    /// with the replacement code-point either way.
    fn advance(&mut self) {
        let invalid = self.cursor.read();
        if invalid && !self.opts.allow_invalid_utf8 {
            let pos = self.cursor.position();
            self.errors.add(ParseError {
                pos,
                prefix: self.error_prefix(),
                message: "invalid encoding".to_string(),
            });
        }
    }

    fn error_prefix(&self) -> String {
        match self.rule_stack.last() {
            Some(name) => format!("rule {}: ", name),
            None => String::new(),
        }
    }

    fn choice_site_key(&self, pos: Position) -> String {
        let rule = self.rule_stack.last().map(String::as_str).unwrap_or("<entry>");
        format!("{} {}:{}", rule, pos.line, pos.col)
    }

    /// Entry point for every sub-expression evaluation: enforces `MaxExpressions`, emits
    /// the optional debug trace, and applies generic packrat memoization (except for
    /// left-recursive rule bodies, handled specially in `eval_rule`).
    fn eval_node(&mut self, id: NodeId) -> EvalResult {
        self.expr_cnt += 1;
        if self.opts.max_expressions != 0 && self.expr_cnt > self.opts.max_expressions {
            return Err(Fatal::MaxExpressions(self.opts.max_expressions));
        }
        if self.opts.debug {
            log::trace!(
                target: "pegrat::interp",
                "{:>indent$}enter {:?} @ {}",
                "",
                id,
                self.cursor.position(),
                indent = self.vars.depth() * 2,
            );
        }

        let memoizable = self.opts.memoize && !self.left_recursive_bodies.contains(&id);
        if !memoizable {
            return self.eval_kind(id);
        }

        let offset = self.cursor.position().offset;
        if let Some(entry) = self.memo.get(offset, id) {
            let v = entry.value.clone().unwrap_or_else(unit);
            let matched = entry.matched;
            let end = entry.end;
            self.cursor.restore(end);
            return Ok((v, matched));
        }

        let (v, matched) = self.eval_kind(id)?;
        let end = self.cursor.save();
        self.memo.set(
            offset,
            id,
            MemoEntry { value: Some(v.clone()), matched, end },
        );
        Ok((v, matched))
    }

    fn eval_kind(&mut self, id: NodeId) -> EvalResult {
        let g = self.lowered;
        let node = g.node(id);
        match &node.kind {
            LExprKind::Choice(alts) => self.eval_choice(alts),
            LExprKind::Sequence(parts) => self.eval_sequence(parts),
            LExprKind::Labeled { label, expr, text_capture } => {
                self.eval_labeled(label, *expr, *text_capture)
            }
            LExprKind::And(inner) => self.eval_and(*inner),
            LExprKind::Not(inner) => self.eval_not(*inner),
            LExprKind::ZeroOrOne(inner) => self.eval_zero_or_one(*inner),
            LExprKind::ZeroOrMore(inner) => self.eval_zero_or_more(*inner),
            LExprKind::OneOrMore(inner) => self.eval_one_or_more(*inner),
            LExprKind::RuleRef(rule_id) => self.eval_rule(*rule_id),
            LExprKind::Lit { val, ignore_case } => self.eval_lit(val, *ignore_case),
            LExprKind::CharClass(cc) => self.eval_char_class(cc),
            LExprKind::Any => self.eval_any(),
            LExprKind::Action { expr, run } => self.eval_action(*expr, run),
            LExprKind::Code(run) => self.eval_code(run),
            LExprKind::Throw(label) => self.eval_throw(label),
            LExprKind::Recovery { expr, recover_expr, labels } => {
                let (expr, recover_expr) = (*expr, *recover_expr);
                self.with_recovery(labels, recover_expr, |s| s.eval_node(expr))
            }
        }
    }

    fn eval_choice(&mut self, alts: &[NodeId]) -> EvalResult {
        let site_pos = self.cursor.position();
        for (i, alt) in alts.iter().enumerate() {
            let csave = self.cursor.save();
            let ssave = self.state.snapshot();
            let alt = *alt;
            let (val, matched) = self.with_var_frame(|s| s.eval_node(alt))?;
            if matched {
                if self.stats.is_some() {
                    let key = self.choice_site_key(site_pos);
                    if let Some(stats) = self.stats.as_mut() {
                        stats.inc_choice_alt_cnt(&key, &(i + 1).to_string());
                    }
                }
                return Ok((val, true));
            }
            self.cursor.restore(csave);
            self.state.restore(ssave);
        }
        if self.stats.is_some() {
            let key = self.choice_site_key(site_pos);
            let no_match_key = self.opts.statistics_no_match_key.clone();
            if let Some(stats) = self.stats.as_mut() {
                stats.inc_choice_alt_cnt(&key, &no_match_key);
            }
        }
        Ok((unit(), false))
    }

    fn eval_sequence(&mut self, parts: &[NodeId]) -> EvalResult {
        let csave = self.cursor.save();
        let ssave = self.state.snapshot();
        let mut vals = Vec::with_capacity(parts.len());
        for part in parts {
            let (val, matched) = self.eval_node(*part)?;
            if !matched {
                self.cursor.restore(csave);
                self.state.restore(ssave);
                return Ok((unit(), false));
            }
            vals.push(val);
        }
        Ok((value(vals), true))
    }

    fn eval_labeled(&mut self, label: &str, expr: NodeId, text_capture: bool) -> EvalResult {
        let start = self.cursor.save();
        let (val, matched) = self.eval_node(expr)?;
        if matched && !label.is_empty() {
            let bound = if text_capture {
                value(self.cursor.slice_from(start).to_vec())
            } else {
                val.clone()
            };
            self.vars.bind(label, bound);
        }
        Ok((val, matched))
    }

    fn eval_and(&mut self, inner: NodeId) -> EvalResult {
        let csave = self.cursor.save();
        let ssave = self.state.snapshot();
        let matched = self.with_var_frame(|s| s.eval_node(inner))?.1;
        self.cursor.restore(csave);
        self.state.restore(ssave);
        Ok((unit(), matched))
    }

    fn eval_not(&mut self, inner: NodeId) -> EvalResult {
        let csave = self.cursor.save();
        let ssave = self.state.snapshot();
        self.farthest.invert = !self.farthest.invert;
        let result = self.with_var_frame(|s| s.eval_node(inner));
        self.farthest.invert = !self.farthest.invert;
        let matched = result?.1;
        self.cursor.restore(csave);
        self.state.restore(ssave);
        Ok((unit(), !matched))
    }

    fn eval_zero_or_one(&mut self, inner: NodeId) -> EvalResult {
        let csave = self.cursor.save();
        let ssave = self.state.snapshot();
        let (val, matched) = self.with_var_frame(|s| s.eval_node(inner))?;
        if matched {
            Ok((value(Some(val)), true))
        } else {
            self.cursor.restore(csave);
            self.state.restore(ssave);
            Ok((value(None::<Value>), true))
        }
    }

    fn eval_zero_or_more(&mut self, inner: NodeId) -> EvalResult {
        let mut vals = Vec::new();
        loop {
            let csave = self.cursor.save();
            let ssave = self.state.snapshot();
            let (val, matched) = self.with_var_frame(|s| s.eval_node(inner))?;
            if !matched {
                self.cursor.restore(csave);
                self.state.restore(ssave);
                break;
            }
            vals.push(val);
        }
        Ok((value(vals), true))
    }

    fn eval_one_or_more(&mut self, inner: NodeId) -> EvalResult {
        let mut vals = Vec::new();
        loop {
            let csave = self.cursor.save();
            let ssave = self.state.snapshot();
            let (val, matched) = self.with_var_frame(|s| s.eval_node(inner))?;
            if !matched {
                self.cursor.restore(csave);
                self.state.restore(ssave);
                break;
            }
            vals.push(val);
        }
        let matched = !vals.is_empty();
        Ok((value(vals), matched))
    }

    fn eval_lit(&mut self, want: &str, ignore_case: bool) -> EvalResult {
        let start = self.cursor.save();
        for want_char in want.chars() {
            if self.cursor.at_eof() {
                self.record_fail(self.cursor.position(), format!("{:?}", want));
                self.cursor.restore(start);
                return Ok((unit(), false));
            }
            let got = self.cursor.rune();
            let matches = if ignore_case {
                got.to_lowercase().eq(want_char.to_lowercase())
            } else {
                got == want_char
            };
            if !matches {
                self.record_fail(self.cursor.position(), format!("{:?}", want));
                self.cursor.restore(start);
                return Ok((unit(), false));
            }
            self.advance();
        }
        Ok((value(self.cursor.slice_from(start).to_vec()), true))
    }

    fn eval_char_class(&mut self, cc: &crate::charclass::CharClass) -> EvalResult {
        if self.cursor.at_eof() {
            self.record_fail(self.cursor.position(), cc.raw.clone());
            return Ok((unit(), false));
        }
        let c = self.cursor.rune();
        if cc.matches(c) {
            self.advance();
            Ok((value(c), true))
        } else {
            self.record_fail(self.cursor.position(), cc.raw.clone());
            Ok((unit(), false))
        }
    }

    fn eval_any(&mut self) -> EvalResult {
        if self.cursor.at_eof() {
            self.record_fail(self.cursor.position(), ".");
            return Ok((unit(), false));
        }
        let c = self.cursor.rune();
        self.advance();
        Ok((value(c), true))
    }

    fn eval_action(&mut self, expr: NodeId, run: &ActionFn) -> EvalResult {
        let start_pos = self.cursor.position();
        let start = self.cursor.save();
        let (_inner_val, matched) = self.eval_node(expr)?;
        if !matched {
            return Ok((unit(), false));
        }
        let text = self.cursor.slice_from(start).to_vec();
        self.invoke_closure(run, start_pos, &text).map(|v| (v, true))
    }

    fn eval_code(&mut self, run: &CodeFn) -> EvalResult {
        let start_pos = self.cursor.position();
        self.invoke_closure(run, start_pos, &[]).map(|v| (v, true))
    }

    /// Shared plumbing for `Action`/`Code`: builds a `Context`, runs the closure, and
    /// folds an `Err` into the accumulated error list (which does not fail the match).
    fn invoke_closure(
        &mut self,
        run: &std::rc::Rc<dyn Fn(&mut Context) -> Result<Value, String>>,
        pos: Position,
        text: &[u8],
    ) -> Result<Value, Fatal> {
        let vars_snapshot = self.vars.top_frame_clone();
        // The action/code closure gets its own copy of the state store so any mutation it
        // makes is transient: the reference implementation's `parseActionExpr` clones state
        // before running the closure and restores it after, discarding the closure's own
        // writes regardless of whether the surrounding match succeeds.
        let ssave = self.state.snapshot();
        let result = {
            let mut ctx = Context {
                pos,
                text,
                state: &mut self.state,
                global_store: &mut self.global_store,
                vars: &vars_snapshot,
            };
            (run)(&mut ctx)
        };
        self.state.restore(ssave);
        match result {
            Ok(v) => Ok(v),
            Err(message) => {
                self.errors.add(ParseError { pos, prefix: self.error_prefix(), message });
                Ok(unit())
            }
        }
    }

    fn eval_throw(&mut self, label: &str) -> EvalResult {
        if let Some(recover_node) = self.recovery.find(label) {
            let csave = self.cursor.save();
            let ssave = self.state.snapshot();
            let (val, matched) = self.eval_node(recover_node)?;
            if matched {
                return Ok((val, true));
            }
            self.cursor.restore(csave);
            self.state.restore(ssave);
            Ok((unit(), false))
        } else {
            self.record_fail(self.cursor.position(), format!("%{{{}}}", label));
            Ok((unit(), false))
        }
    }

    fn eval_rule(&mut self, rule_id: RuleId) -> EvalResult {
        let rule: &'g LRule = self.lowered.rule(rule_id);
        self.rule_stack.push(rule.display_name.clone());
        let result = self.with_var_frame(|s| {
            if rule.leader {
                s.eval_leader(rule)
            } else {
                // Non-cyclic rule bodies are memoized transparently by `eval_node`'s
                // generic wrapper; bodies of non-leader left-recursive rules are excluded
                // from that memo via `left_recursive_bodies`, giving exactly the "direct
                // path" the reference implementation calls out for them.
                s.eval_node(rule.body)
            }
        });
        self.rule_stack.pop();
        result
    }

    /// Warth-style seed-growing for a left-recursion leader, mirroring
    /// `crate::memo::grow_seed`'s algorithm directly against `self` (that helper is kept
    /// as a standalone, independently-tested reference implementation of the same logic;
    /// inlining it here avoids threading `&mut Interp` through a generic closure
    /// parameter, which Rust's borrow checker cannot split the way a bare `&mut
    /// MemoTable` can).
    fn eval_leader(&mut self, rule: &'g LRule) -> EvalResult {
        let node = rule.body;
        let start = self.cursor.save();
        let start_offset = start.offset();

        // Base case for the recursive re-entry: a `RuleRef` back into this same leader at
        // this same offset (direct or through other rules) calls `eval_rule` -> `eval_leader`
        // again before this call returns. Reading back whatever seed/grown entry is already
        // memoized here turns that re-entry into a plain lookup instead of unbounded
        // recursion. On the very first entry nothing is memoized yet, so we fall through to
        // seed the growth below.
        if let Some(entry) = self.memo.get(start_offset, node) {
            let v = entry.value.clone().unwrap_or_else(unit);
            let matched = entry.matched;
            self.cursor.restore(entry.end);
            return Ok((v, matched));
        }

        self.memo.set(start_offset, node, MemoEntry { value: None, matched: false, end: start });
        let mut last = MemoEntry { value: None, matched: false, end: start };
        let mut depth = 0usize;

        loop {
            self.cursor.restore(start);
            let ssave = self.state.snapshot();
            let esave = self.errors.clone();
            let (val, matched) = self.eval_node(node)?;
            let end = self.cursor.save();
            if !matched || (end.offset() <= last.end.offset() && depth != 0) {
                self.state.restore(ssave);
                self.errors = esave;
                break;
            }
            last = MemoEntry { value: Some(val), matched: true, end };
            self.memo.set(
                start_offset,
                node,
                MemoEntry { value: last.value.clone(), matched: true, end },
            );
            depth += 1;
        }

        self.memo.set(
            start_offset,
            node,
            MemoEntry { value: last.value.clone(), matched: last.matched, end: last.end },
        );
        self.cursor.restore(last.end);
        Ok((last.value.unwrap_or_else(unit), last.matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Grammar, Rule};
    use crate::lower::lower;

    fn build(rules: Vec<Rule>) -> LoweredGrammar {
        let g = Grammar::new(rules);
        crate::analyze::analyze(&g);
        crate::leftrec::classify(&g);
        lower(g).unwrap()
    }

    #[test]
    fn matches_literal() {
        let lg = build(vec![Rule::new("r", Expr::lit("abc"))]);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"abc", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(matched);
    }

    #[test]
    fn literal_mismatch_fails_without_consuming() {
        let lg = build(vec![Rule::new("r", Expr::lit("abc"))]);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"xyz", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(!matched);
        assert_eq!(interp.farthest().pos.offset, 0);
    }

    #[test]
    fn sequence_of_star_then_literal() {
        // S <- "a"* "b"
        let lg = build(vec![Rule::new(
            "S",
            Expr::Sequence(vec![Expr::ZeroOrMore(Box::new(Expr::lit("a"))), Expr::lit("b")]),
        )]);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"aaab", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(matched);
        assert!(interp.cursor.at_eof());
    }

    #[test]
    fn not_predicate_never_consumes() {
        // R <- &"x" .
        let lg = build(vec![Rule::new(
            "R",
            Expr::Sequence(vec![
                Expr::And(Box::new(Expr::lit("x"))),
                Expr::Any,
            ]),
        )]);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"y", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(!matched);
        assert_eq!(interp.farthest().pos.offset, 0);
    }

    #[test]
    fn left_recursive_leader_grows_seed() {
        // A <- A "x" / "a"
        let lg = build(vec![Rule::new(
            "A",
            Expr::Choice(vec![
                Expr::Sequence(vec![Expr::rule_ref("A"), Expr::lit("x")]),
                Expr::lit("a"),
            ]),
        )]);
        assert!(lg.rules[0].left_recursive);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"axxx", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(matched);
        assert!(interp.cursor.at_eof());
    }

    #[test]
    fn max_expressions_cap_is_fatal() {
        let lg = build(vec![Rule::new(
            "R",
            Expr::ZeroOrMore(Box::new(Expr::lit("a"))),
        )]);
        let mut opts = ResolvedOptions::default();
        opts.max_expressions = 2;
        let mut interp = Interp::new(&lg, b"aaaaaaaaaa", &opts);
        let result = interp.run(RuleId(0));
        assert!(matches!(result, Err(Fatal::MaxExpressions(2))));
    }

    #[test]
    fn action_error_is_recorded_but_match_succeeds() {
        let lg = build(vec![Rule::new(
            "R",
            Expr::action(Expr::lit("a"), std::rc::Rc::new(|_ctx: &mut Context| Err("boom".to_string()))),
        )]);
        let opts = ResolvedOptions::default();
        let mut interp = Interp::new(&lg, b"a", &opts);
        let (_, matched) = interp.run(RuleId(0)).unwrap();
        assert!(matched);
        assert_eq!(interp.errors().0.len(), 1);
        assert!(interp.errors().0[0].message.contains("boom"));
    }
}
