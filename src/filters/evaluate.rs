//! Filter expression evaluation
//!
//! Semantics:
//! - A missing expression always passes (permissive default).
//! - Relational nodes read the named article field, treating absent fields
//!   as the empty string; `not` inverts the verdict after evaluation.
//! - `AND` short-circuits on the first failing child and returns only that
//!   child's explanations; over zero children it passes.
//! - `OR` short-circuits on the first passing child and discards collected
//!   explanations; over zero children it passes; when no child passes all
//!   children's explanations are concatenated.
//! - Regex timeouts and invalid patterns are errors, never verdicts.

use std::time::Duration;

use crate::models::Article;

use super::regex::{test_pattern, DEFAULT_REGEX_TIMEOUT};
use super::{
    Explanation, FilterError, FilterExpression, LogicalExpression, LogicalOp,
    RelationalExpression, RelationalOp,
};

/// Verdict plus blocked diagnostics for one (expression, article) pair
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Whether the article passed the filter
    pub passed: bool,

    /// Why it was blocked; empty on a pass
    pub explain_blocked: Vec<Explanation>,
}

impl FilterOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            explain_blocked: Vec::new(),
        }
    }
}

/// Evaluates filter expressions against articles
///
/// Pure with respect to shared state; the only tunable is the regex
/// wall-clock budget.
#[derive(Debug, Clone)]
pub struct FilterEvaluator {
    regex_timeout: Duration,
}

impl Default for FilterEvaluator {
    fn default() -> Self {
        Self {
            regex_timeout: DEFAULT_REGEX_TIMEOUT,
        }
    }
}

impl FilterEvaluator {
    /// Create an evaluator with a custom regex budget
    pub fn new(regex_timeout: Duration) -> Self {
        Self { regex_timeout }
    }

    /// Evaluate an optional expression against an article
    pub fn evaluate(
        &self,
        expression: Option<&FilterExpression>,
        article: &Article,
    ) -> Result<FilterOutcome, FilterError> {
        match expression {
            None => Ok(FilterOutcome::pass()),
            Some(expr) => self.evaluate_node(expr, article),
        }
    }

    fn evaluate_node(
        &self,
        expression: &FilterExpression,
        article: &Article,
    ) -> Result<FilterOutcome, FilterError> {
        match expression {
            FilterExpression::Logical(logical) => self.evaluate_logical(logical, article),
            FilterExpression::Relational(relational) => {
                self.evaluate_relational(relational, article)
            }
        }
    }

    fn evaluate_logical(
        &self,
        expression: &LogicalExpression,
        article: &Article,
    ) -> Result<FilterOutcome, FilterError> {
        match expression.op {
            LogicalOp::And => {
                for child in &expression.children {
                    let outcome = self.evaluate_node(child, article)?;
                    if !outcome.passed {
                        return Ok(FilterOutcome {
                            passed: false,
                            explain_blocked: outcome.explain_blocked,
                        });
                    }
                }
                Ok(FilterOutcome::pass())
            }
            LogicalOp::Or => {
                if expression.children.is_empty() {
                    return Ok(FilterOutcome::pass());
                }

                let mut all_explanations = Vec::new();
                for child in &expression.children {
                    let outcome = self.evaluate_node(child, article)?;
                    if outcome.passed {
                        return Ok(FilterOutcome::pass());
                    }
                    all_explanations.extend(outcome.explain_blocked);
                }
                Ok(FilterOutcome {
                    passed: false,
                    explain_blocked: all_explanations,
                })
            }
        }
    }

    fn evaluate_relational(
        &self,
        expression: &RelationalExpression,
        article: &Article,
    ) -> Result<FilterOutcome, FilterError> {
        let field = expression.left.field_name();
        let literal = expression.right.literal();
        let reference = article.value_or_empty(field);

        let mut explain_blocked = Vec::new();

        let matched = match expression.op {
            RelationalOp::Eq => {
                let matched = reference == literal;
                if !matched {
                    explain_blocked.push(Explanation {
                        message: format!("Field {field} does not equal the filter input"),
                        reference_value: Some(reference.to_string()),
                        filter_input: literal.to_string(),
                    });
                }
                matched
            }
            RelationalOp::Contains => {
                let matched = reference.to_lowercase().contains(&literal.to_lowercase());
                if !matched {
                    explain_blocked.push(Explanation {
                        message: format!("Field {field} does not contain the filter input"),
                        reference_value: Some(reference.to_string()),
                        filter_input: literal.to_string(),
                    });
                }
                matched
            }
            RelationalOp::Matches => {
                let matched = test_pattern(literal, reference, self.regex_timeout)?;
                if !matched {
                    explain_blocked.push(Explanation {
                        message: format!("Field {field} does not match the filter regex"),
                        reference_value: Some(reference.to_string()),
                        filter_input: literal.to_string(),
                    });
                }
                matched
            }
        };

        let passed = if expression.not { !matched } else { matched };

        Ok(FilterOutcome {
            passed,
            explain_blocked,
        })
    }
}
