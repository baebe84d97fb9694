//! Optional parse statistics.
//!
//! Grounded on the reference implementation's `Stats{ExprCnt, ChoiceAltCnt}` and
//! `incChoiceAltCnt`: a total expression-evaluation counter, plus a nested per-choice-site
//! histogram of which alternative (1-indexed) matched, keyed by `"<rule> <line>:<col>"`.

use rustc_hash::FxHashMap;

/// Collected when [`crate::options::Option::Statistics`] is enabled.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub expr_cnt: usize,
    pub choice_alt_cnt: FxHashMap<String, FxHashMap<String, usize>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_expr_cnt(&mut self) {
        self.expr_cnt += 1;
    }

    /// Record that alternative `alt_key` (either `"N"` for the matching branch's
    /// 1-indexed position, or a configured no-match key) was taken at choice site
    /// `site_key`.
    pub fn inc_choice_alt_cnt(&mut self, site_key: &str, alt_key: &str) {
        *self
            .choice_alt_cnt
            .entry(site_key.to_string())
            .or_default()
            .entry(alt_key.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_alt_cnt_accumulates_per_site() {
        let mut s = Stats::new();
        s.inc_choice_alt_cnt("rule 1:1", "1");
        s.inc_choice_alt_cnt("rule 1:1", "1");
        s.inc_choice_alt_cnt("rule 1:1", "2");
        assert_eq!(s.choice_alt_cnt["rule 1:1"]["1"], 2);
        assert_eq!(s.choice_alt_cnt["rule 1:1"]["2"], 1);
    }
}
