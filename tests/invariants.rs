//! Universally-quantified properties checked against randomly generated inputs over a
//! couple of small fixed grammars, rather than hand-enumerated cases.

use proptest::prelude::*;

use pegrat::{parse, Expr, Grammar, ParseOption, Rule};

fn digits_grammar() -> pegrat::LoweredGrammar {
    let digit = Expr::CharClass(pegrat::charclass::CharClass::parse("[0-9]"));
    Grammar::new(vec![Rule::new("digits", Expr::OneOrMore(Box::new(digit)))])
        .analyze_and_lower()
        .unwrap()
}

fn and_predicate_grammar() -> pegrat::LoweredGrammar {
    // R <- &"a" "a"*
    Grammar::new(vec![Rule::new(
        "R",
        Expr::Sequence(vec![
            Expr::And(Box::new(Expr::lit("a"))),
            Expr::ZeroOrMore(Box::new(Expr::lit("a"))),
        ]),
    )])
    .analyze_and_lower()
    .unwrap()
}

fn sequence_grammar() -> pegrat::LoweredGrammar {
    // S <- "ab" "cd"
    Grammar::new(vec![Rule::new(
        "S",
        Expr::Sequence(vec![Expr::lit("ab"), Expr::lit("cd")]),
    )])
    .analyze_and_lower()
    .unwrap()
}

fn render(outcome: &Result<pegrat::ParseOutcome, pegrat::PegError>) -> String {
    match outcome {
        Ok(o) => format!(
            "ok(matched={}, errors={}, expr_cnt={})",
            o.value.is_some(),
            o.errors,
            o.expr_cnt
        ),
        Err(e) => format!("err({e})"),
    }
}

proptest! {
    /// Invariant 1: determinism. Two `parse` calls with the same grammar, input, and
    /// options produce structurally equal outcomes.
    #[test]
    fn determinism(input in "[0-9]{0,12}") {
        let lowered = digits_grammar();
        let a = parse(&lowered, input.as_bytes(), &[]);
        let b = parse(&lowered, input.as_bytes(), &[]);
        prop_assert_eq!(render(&a), render(&b));
    }

    /// Invariant 2: predicate cursor-neutrality. An `&e` ahead of a repetition over the
    /// same literal never changes what the repetition itself consumes; wrapping a
    /// zero-or-more "a" run behind a redundant `&"a"` and comparing the matched byte
    /// length to the un-predicated rule gives the same answer for any run of a's and b's.
    #[test]
    fn and_predicate_does_not_change_match_length(input in "a{1,8}b{0,4}") {
        // At least one leading 'a' guarantees `&"a"` succeeds, so both grammars below
        // always match; only the a-run length they each report should be compared.
        let predicated = and_predicate_grammar();
        let bare = Grammar::new(vec![Rule::new(
            "R",
            Expr::ZeroOrMore(Box::new(Expr::lit("a"))),
        )])
        .analyze_and_lower()
        .unwrap();

        let with_pred = parse(&predicated, input.as_bytes(), &[]).expect("leading 'a' guarantees a match");
        let without_pred = parse(&bare, input.as_bytes(), &[]).expect("zero-or-more always matches");

        let len_with = with_pred
            .value
            .unwrap()
            .downcast_ref::<Vec<pegrat::Value>>()
            .unwrap()
            .len();
        let len_without = without_pred
            .value
            .unwrap()
            .downcast_ref::<Vec<pegrat::Value>>()
            .unwrap()
            .len();
        prop_assert_eq!(len_with, len_without);
    }

    /// Invariant 4: sequence atomicity. If a two-part sequence's second element fails to
    /// match, the overall parse fails and the farthest-failure offset always lands at the
    /// boundary between the two literals (i.e. never inside the first literal, which
    /// sequence's all-or-nothing restore guarantees cannot be partially consumed).
    #[test]
    fn sequence_failure_reports_boundary_offset(tail in "[a-z]{0,4}") {
        let lowered = sequence_grammar();
        let input = format!("ab{tail}");
        let result = parse(&lowered, input.as_bytes(), &[]);
        if !tail.starts_with("cd") {
            match result {
                Err(pegrat::PegError::NoMatch { pos, .. }) => {
                    prop_assert_eq!(pos.offset, 2);
                }
                other => prop_assert!(false, "expected NoMatch at offset 2, got {:?}", render(&other)),
            }
        }
    }

    /// Invariant 10: max-expressions cap. With `MaxExpressions(n)` set, either the parse
    /// succeeds having evaluated at most `n` expressions, or it fails with the
    /// max-expressions error; it never silently evaluates past the cap.
    #[test]
    fn max_expressions_cap_is_honored(input in "[0-9]{1,20}", cap in 1usize..30) {
        let lowered = digits_grammar();
        let result = parse(&lowered, input.as_bytes(), &[ParseOption::MaxExpressions(cap)]);
        match result {
            Ok(o) => prop_assert!(o.expr_cnt <= cap),
            Err(pegrat::PegError::MaxExpressions(n)) => prop_assert_eq!(n, cap),
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
