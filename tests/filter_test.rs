//! Integration tests for filter expression evaluation

mod common;

use std::time::Duration;

use common::article;
use mulgyeol::filters::{
    FilterError, FilterEvaluator, FilterExpression, RelationalExpression, RelationalOp,
};

fn eq(field: &str, literal: &str) -> FilterExpression {
    FilterExpression::relational(RelationalOp::Eq, field, literal)
}

#[test]
fn and_fails_with_only_the_failing_childs_explanation() {
    let evaluator = FilterEvaluator::default();
    let expression = FilterExpression::and(vec![eq("title", "a"), eq("title", "b")]);
    let subject = article(&[("title", "a")]);

    let outcome = evaluator.evaluate(Some(&expression), &subject).unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.explain_blocked.len(), 1);
    assert_eq!(outcome.explain_blocked[0].filter_input, "b");
}

#[test]
fn or_passes_with_empty_explanation() {
    let evaluator = FilterEvaluator::default();
    let expression = FilterExpression::or(vec![eq("title", "a"), eq("title", "b")]);
    let subject = article(&[("title", "a")]);

    let outcome = evaluator.evaluate(Some(&expression), &subject).unwrap();
    assert!(outcome.passed);
    assert!(outcome.explain_blocked.is_empty());
}

#[test]
fn negated_nonmatching_regex_passes() {
    let evaluator = FilterEvaluator::default();
    let expression = FilterExpression::Relational(
        RelationalExpression::new(RelationalOp::Matches, "title", "^nomatch$").negated(),
    );
    let subject = article(&[("title", "something else")]);

    let outcome = evaluator.evaluate(Some(&expression), &subject).unwrap();
    assert!(outcome.passed);
}

#[test]
fn nested_expressions_evaluate_depth_first() {
    let evaluator = FilterEvaluator::default();
    // (title EQ "a" AND (category EQ "news" OR category EQ "tech"))
    let expression = FilterExpression::and(vec![
        eq("title", "a"),
        FilterExpression::or(vec![eq("category", "news"), eq("category", "tech")]),
    ]);

    let passing = article(&[("title", "a"), ("category", "tech")]);
    assert!(evaluator
        .evaluate(Some(&expression), &passing)
        .unwrap()
        .passed);

    let blocked = article(&[("title", "a"), ("category", "sports")]);
    let outcome = evaluator.evaluate(Some(&expression), &blocked).unwrap();
    assert!(!outcome.passed);
    // The failing OR contributes both children's explanations
    assert_eq!(outcome.explain_blocked.len(), 2);
}

#[test]
fn evaluation_errors_are_propagated_not_swallowed() {
    let evaluator = FilterEvaluator::default();
    let expression = FilterExpression::or(vec![
        FilterExpression::relational(RelationalOp::Matches, "title", "(unclosed"),
        eq("title", "a"),
    ]);
    let subject = article(&[("title", "a")]);

    // The OR would pass on its second child, but the first child's invalid
    // pattern must surface as an error instead
    let err = evaluator.evaluate(Some(&expression), &subject).unwrap_err();
    assert!(matches!(err, FilterError::InvalidPattern { .. }));
}

#[test]
fn regex_budget_is_enforced() {
    // A zero budget forces the deadline before the worker can answer
    let evaluator = FilterEvaluator::new(Duration::ZERO);
    let haystack = "a".repeat(4_000_000);
    let expression = FilterExpression::relational(RelationalOp::Matches, "title", "a*b$");
    let subject = article(&[("title", haystack.as_str())]);

    let err = evaluator.evaluate(Some(&expression), &subject).unwrap_err();
    assert!(matches!(err, FilterError::PatternTimeout { .. }));
}

#[test]
fn wire_format_roundtrip_preserves_semantics() {
    let json = r#"{
        "type": "LOGICAL",
        "op": "AND",
        "children": [
            {
                "type": "RELATIONAL",
                "op": "CONTAINS",
                "not": true,
                "left": { "type": "ARTICLE", "value": "title" },
                "right": { "type": "STRING", "value": "spoiler" }
            }
        ]
    }"#;

    let expression: FilterExpression = serde_json::from_str(json).unwrap();
    expression.validate().unwrap();

    let evaluator = FilterEvaluator::default();
    let spoiler = article(&[("title", "A Spoiler-heavy recap")]);
    let clean = article(&[("title", "Weekly digest")]);

    assert!(!evaluator.evaluate(Some(&expression), &spoiler).unwrap().passed);
    assert!(evaluator.evaluate(Some(&expression), &clean).unwrap().passed);
}
