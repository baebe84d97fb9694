//! Parse-call options.
//!
//! The reference implementation represents options as reversible functional-option
//! closures over a long-lived parser object (each returns the previous value so a caller
//! can save/restore a tunable around one call). This crate never keeps a long-lived parser
//! instance across calls — [`crate::interp::Interp`] is built fresh per `parse` — so there
//! is nothing to revert *to*; the reversibility is therefore modeled as an ordinary,
//! non-reversible builder applied once at call entry (documented as an explicit departure
//! in DESIGN.md rather than left implicit).

use crate::value::Value;

/// One tunable passed to [`crate::parse`]/[`crate::parse_reader`]/[`crate::parse_file`].
pub enum ParseOption {
    MaxExpressions(usize),
    Entrypoint(String),
    Debug(bool),
    Memoize(bool),
    AllowInvalidUtf8(bool),
    Recover(bool),
    GlobalStore(String, Value),
    InitState(String, Value),
    Statistics(bool),
    /// Overrides the key used for a `Choice` site's not-matched counter (default
    /// `"no match"`); only meaningful together with `Statistics(true)`.
    StatisticsNoMatchKey(String),
}

pub(crate) struct ResolvedOptions {
    pub max_expressions: usize,
    pub entrypoint: Option<String>,
    pub debug: bool,
    pub memoize: bool,
    pub allow_invalid_utf8: bool,
    pub recover: bool,
    pub global_store_seed: Vec<(String, Value)>,
    pub init_state_seed: Vec<(String, Value)>,
    pub statistics: bool,
    pub statistics_no_match_key: String,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        ResolvedOptions {
            max_expressions: 0,
            entrypoint: None,
            debug: false,
            memoize: true,
            allow_invalid_utf8: true,
            recover: true,
            global_store_seed: Vec::new(),
            init_state_seed: Vec::new(),
            statistics: false,
            statistics_no_match_key: "no match".to_string(),
        }
    }
}

impl ResolvedOptions {
    pub fn apply(opts: &[ParseOption]) -> Self {
        let mut r = ResolvedOptions::default();
        for opt in opts {
            match opt {
                ParseOption::MaxExpressions(n) => r.max_expressions = *n,
                ParseOption::Entrypoint(name) => r.entrypoint = Some(name.clone()),
                ParseOption::Debug(b) => r.debug = *b,
                ParseOption::Memoize(b) => r.memoize = *b,
                ParseOption::AllowInvalidUtf8(b) => r.allow_invalid_utf8 = *b,
                ParseOption::Recover(b) => r.recover = *b,
                ParseOption::GlobalStore(k, v) => r.global_store_seed.push((k.clone(), v.clone())),
                ParseOption::InitState(k, v) => r.init_state_seed.push((k.clone(), v.clone())),
                ParseOption::Statistics(b) => r.statistics = *b,
                ParseOption::StatisticsNoMatchKey(k) => r.statistics_no_match_key = k.clone(),
            }
        }
        r
    }
}
