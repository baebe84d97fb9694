//! A backtracking PEG grammar analyzer and interpreter: packrat memoization,
//! failure-label recovery, and Warth-style seed-growing for left recursion.
//!
//! A caller builds a [`Grammar`] (typically via an out-of-scope front-end that parses
//! grammar syntax), analyzes and lowers it once, then calls [`parse`]/[`parse_reader`]/
//! [`parse_file`] against as many inputs as it likes. Lowering is pure and a [`LoweredGrammar`]
//! is reusable across any number of sequential parses, but it is not `Send`/`Sync`: actions and
//! code blocks carry `Rc<dyn Fn(..)>` closures ([`ActionFn`]/[`CodeFn`]) and values flow as
//! `Rc<dyn Any>` ([`Value`]), so concurrent parses against one grammar need one lowered grammar
//! (or an `Rc`-free clone of it) per thread rather than a single shared reference.
//!
//! ```ignore
//! let grammar = Grammar::new(vec![Rule::new("greeting", Expr::lit("hello"))]);
//! let lowered = grammar.analyze_and_lower()?;
//! let outcome = parse(&lowered, b"hello", &[])?;
//! ```

pub mod analyze;
pub mod ast;
pub mod charclass;
pub mod cursor;
pub mod errors;
pub mod ids;
pub mod interp;
pub mod leftrec;
pub mod lower;
pub mod memo;
pub mod options;
pub mod state;
pub mod stats;
pub mod value;

pub use ast::{ActionFn, CodeFn, Context, Expr, Grammar, Rule};
pub use cursor::Position;
pub use errors::{ErrorList, ParseError, PegError};
pub use ids::{NodeId, RuleId};
pub use lower::LoweredGrammar;
pub use options::ParseOption;
pub use stats::Stats;
pub use value::{unit, value, ClonableAny, Value};

use std::io::Read as _;
use std::path::Path;

impl Grammar {
    /// Run the nullability/first-name analyzer and the left-recursion classifier, then
    /// consume the grammar into its lowered, execution-ready form. The two-step pipeline
    /// this wraps (`analyze::analyze` then `leftrec::classify`, each populating the
    /// per-rule `Cell` annotations in place, before `lower::lower` consumes the grammar by
    /// value) is also available as those free functions directly, for a front-end that
    /// wants to inspect the annotated AST between steps.
    pub fn analyze_and_lower(self) -> Result<LoweredGrammar, PegError> {
        analyze::analyze(&self);
        leftrec::classify(&self);
        lower::lower(self)
    }
}

/// Everything a single `parse` call produced: the matched value (if the entrypoint
/// matched), the accumulated non-fatal error list (user-action errors, invalid-encoding
/// errors under strict UTF-8), and statistics (if [`ParseOption::Statistics`] was set).
#[derive(Default)]
pub struct ParseOutcome {
    pub value: Option<Value>,
    pub errors: ErrorList,
    pub stats: Option<Stats>,
    /// Total expression evaluations performed, for comparing against a configured
    /// [`ParseOption::MaxExpressions`] cap.
    pub expr_cnt: usize,
}

impl std::fmt::Debug for ParseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOutcome")
            .field("value", &self.value.as_ref().map(|_| "<value>"))
            .field("errors", &self.errors)
            .field("stats", &self.stats)
            .field("expr_cnt", &self.expr_cnt)
            .finish()
    }
}

/// Run `grammar`'s entrypoint rule against `data`. The primary entry point; `parse_reader`
/// and `parse_file` are thin wrappers that read their input up front and delegate here.
pub fn parse(
    lowered: &LoweredGrammar,
    data: &[u8],
    opts: &[ParseOption],
) -> Result<ParseOutcome, PegError> {
    let resolved = options::ResolvedOptions::apply(opts);
    let entry = match &resolved.entrypoint {
        Some(name) => lowered
            .rule_index(name)
            .ok_or_else(|| PegError::InvalidEntrypoint(name.clone()))?,
        None => RuleId(0),
    };
    let recover = resolved.recover;

    let mut interp = interp::Interp::new(lowered, data, &resolved);

    let result = if recover {
        let guarded = std::panic::AssertUnwindSafe(&mut interp);
        match std::panic::catch_unwind(move || {
            let mut guarded = guarded;
            guarded.0.run(entry)
        }) {
            Ok(r) => r,
            Err(payload) => return Err(PegError::Panic(panic_message(payload))),
        }
    } else {
        interp.run(entry)
    };

    match result {
        Ok((value, true)) => Ok(ParseOutcome {
            value: Some(value),
            errors: interp.errors().clone(),
            stats: interp.stats().cloned(),
            expr_cnt: interp.expr_cnt(),
        }),
        Ok((_, false)) => {
            if interp.errors().is_empty() {
                Err(PegError::NoMatch {
                    pos: interp.farthest().pos,
                    expected: interp.farthest().render_expected(),
                })
            } else {
                Err(PegError::Errors(interp.errors().clone()))
            }
        }
        Err(interp::Fatal::MaxExpressions(n)) => Err(PegError::MaxExpressions(n)),
    }
}

/// Read all of `reader` to a byte buffer, then [`parse`] it.
pub fn parse_reader<R: std::io::Read>(
    lowered: &LoweredGrammar,
    mut reader: R,
    opts: &[ParseOption],
) -> Result<ParseOutcome, PegError> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| PegError::Io(e.to_string()))?;
    parse(lowered, &data, opts)
}

/// Open, read, and [`parse`] the file at `path`.
pub fn parse_file(
    lowered: &LoweredGrammar,
    path: impl AsRef<Path>,
    opts: &[ParseOption],
) -> Result<ParseOutcome, PegError> {
    let data = std::fs::read(path).map_err(|e| PegError::Io(e.to_string()))?;
    parse(lowered, &data, opts)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits_grammar() -> Grammar {
        let digit = Expr::CharClass(crate::charclass::CharClass::parse("0-9"));
        Grammar::new(vec![Rule::new(
            "digits",
            Expr::OneOrMore(Box::new(digit)),
        )])
    }

    #[test]
    fn empty_grammar_errors_on_lower() {
        let g = Grammar::new(Vec::new());
        assert!(matches!(g.analyze_and_lower(), Err(PegError::EmptyGrammar)));
    }

    #[test]
    fn unknown_entrypoint_errors() {
        let g = Grammar::new(vec![Rule::new("a", Expr::lit("x"))]);
        let lowered = g.analyze_and_lower().unwrap();
        let err = parse(&lowered, b"x", &[ParseOption::Entrypoint("nope".into())]).unwrap_err();
        assert!(matches!(err, PegError::InvalidEntrypoint(name) if name == "nope"));
    }

    #[test]
    fn literal_grammar_matches_and_returns_value() {
        let g = Grammar::new(vec![Rule::new("a", Expr::lit("hello"))]);
        let lowered = g.analyze_and_lower().unwrap();
        let outcome = parse(&lowered, b"hello", &[]).unwrap();
        assert!(outcome.value.is_some());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn no_match_synthesizes_expected_set() {
        let g = Grammar::new(vec![Rule::new("a", Expr::lit("hello"))]);
        let lowered = g.analyze_and_lower().unwrap();
        let err = parse(&lowered, b"goodbye", &[]).unwrap_err();
        match err {
            PegError::NoMatch { expected, .. } => assert_eq!(expected, "\"hello\""),
            other => panic!("expected NoMatch, got {other:?}"),
        }
    }

    #[test]
    fn digits_grammar_matches_digit_run() {
        let g = digits_grammar();
        let lowered = g.analyze_and_lower().unwrap();
        let outcome = parse(&lowered, b"123", &[]).unwrap();
        assert!(outcome.value.is_some());
    }
}
