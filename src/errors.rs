//! Error accumulation and farthest-failure tracking.
//!
//! Grounded on the reference implementation's `errList`, `parserError`, and
//! `failAt`/`addErr`/`addErrAt`: every terminal-matcher failure reports what it expected at
//! its position; we keep only the failure(s) at the single farthest offset reached, since
//! that is almost always the most useful diagnostic for a backtracking parser.

use thiserror::Error;

use crate::cursor::Position;

/// One user-facing parse error: a rule-context-prefixed message at a position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{prefix}{message}")]
pub struct ParseError {
    pub pos: Position,
    pub prefix: String,
    pub message: String,
}

/// Top-level error returned by the public entry points.
#[derive(Debug, Error)]
pub enum PegError {
    #[error("no match found, expected: {expected}")]
    NoMatch { pos: Position, expected: String },

    #[error("{0}")]
    Errors(ErrorList),

    #[error("grammar has no rules")]
    EmptyGrammar,

    #[error("invalid entrypoint rule {0:?}")]
    InvalidEntrypoint(String),

    #[error("rule {0:?} is referenced but not defined")]
    UndefinedRule(String),

    #[error("invalid UTF-8 encoding at {0}")]
    InvalidEncoding(Position),

    #[error("expression count exceeded configured maximum ({0})")]
    MaxExpressions(usize),

    #[error("parser panicked: {0}")]
    Panic(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// An accumulated, de-duplicated list of non-fatal parse errors (`code` block errors,
/// action errors), joined by newline for display — mirrors `errList.Error()`.
#[derive(Debug, Default, Clone)]
pub struct ErrorList(pub Vec<ParseError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `err`, skipping it if an error with the same rendered message is already
    /// present (the reference implementation de-dupes by message string).
    pub fn add(&mut self, err: ParseError) {
        let rendered = err.to_string();
        if !self.0.iter().any(|e| e.to_string() == rendered) {
            self.0.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", rendered.join("\n"))
    }
}

/// Tracks the farthest offset at which a terminal matcher (literal, char class, `.`, an
/// explicit `Throw`) failed, along with the set of things that were expected there. Reset
/// is never needed: only forward progress ever updates it within a single top-level parse.
#[derive(Debug, Default)]
pub struct FarthestFailure {
    pub pos: Position,
    pub expected: Vec<String>,
    /// Set while evaluating the body of a `Not` predicate: a failure there should be
    /// reported as "expected not X" rather than "expected X", mirroring
    /// `maxFailInvertExpected`.
    pub invert: bool,
}

impl FarthestFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal-matcher failure expecting `want` at `pos`. Farther failures
    /// replace the recorded set; equal-offset failures accumulate (deduped); nearer
    /// failures are ignored.
    pub fn fail_at(&mut self, pos: Position, want: impl Into<String>) {
        let want = if self.invert {
            format!("!{}", want.into())
        } else {
            want.into()
        };
        if pos.offset > self.pos.offset {
            self.pos = pos;
            self.expected = vec![want];
        } else if pos.offset == self.pos.offset && !self.expected.contains(&want) {
            self.expected.push(want);
        }
    }

    /// Render the accumulated expectation set into the reference implementation's
    /// `"no match found, expected: [a, b] or EOF"`-style join, with `"!."` (not-any,
    /// i.e. "expected end of input") rendered as `EOF` and sorted last.
    pub fn render_expected(&self) -> String {
        let mut items: Vec<String> = self
            .expected
            .iter()
            .filter(|s| s.as_str() != "!.")
            .cloned()
            .collect();
        items.sort();
        items.dedup();
        if self.expected.iter().any(|s| s == "!.") {
            items.push("EOF".to_string());
        }
        match items.len() {
            0 => "something else".to_string(),
            1 => items.remove(0),
            _ => {
                let last = items.pop().unwrap();
                format!("{} or {}", items.join(", "), last)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farther_failure_replaces_nearer_one() {
        let mut f = FarthestFailure::new();
        f.fail_at(Position { line: 1, col: 1, offset: 0 }, "a");
        f.fail_at(Position { line: 1, col: 3, offset: 2 }, "b");
        assert_eq!(f.pos.offset, 2);
        assert_eq!(f.expected, vec!["b".to_string()]);
    }

    #[test]
    fn equal_offset_failures_accumulate() {
        let mut f = FarthestFailure::new();
        f.fail_at(Position { line: 1, col: 1, offset: 0 }, "a");
        f.fail_at(Position { line: 1, col: 1, offset: 0 }, "b");
        assert_eq!(f.expected, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn nearer_failure_is_ignored() {
        let mut f = FarthestFailure::new();
        f.fail_at(Position { line: 1, col: 3, offset: 2 }, "a");
        f.fail_at(Position { line: 1, col: 1, offset: 0 }, "b");
        assert_eq!(f.expected, vec!["a".to_string()]);
    }

    #[test]
    fn invert_flag_prefixes_bang() {
        let mut f = FarthestFailure::new();
        f.invert = true;
        f.fail_at(Position::default(), "x");
        assert_eq!(f.expected, vec!["!x".to_string()]);
    }

    #[test]
    fn render_joins_with_or_and_maps_eof() {
        let mut f = FarthestFailure::new();
        f.fail_at(Position::default(), "a");
        f.fail_at(Position::default(), "!.");
        assert_eq!(f.render_expected(), "a or EOF");
    }

    #[test]
    fn error_list_dedupes_by_message() {
        let mut list = ErrorList::new();
        let e = ParseError { pos: Position::default(), prefix: String::new(), message: "boom".into() };
        list.add(e.clone());
        list.add(e);
        assert_eq!(list.0.len(), 1);
    }
}
