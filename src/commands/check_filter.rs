//! The `check-filter` command: explain a filter verdict for one article

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::filters::{FilterEvaluator, FilterExpression};
use crate::models::Article;

/// Evaluate an expression file against an article file and print the
/// verdict with its explanations
pub fn check_filter(config: &Config, expression_path: &Path, article_path: &Path) -> Result<()> {
    let expression_text = std::fs::read_to_string(expression_path)
        .with_context(|| format!("Failed to read expression: {}", expression_path.display()))?;
    let expression: FilterExpression = serde_json::from_str(&expression_text)
        .with_context(|| format!("Invalid expression JSON: {}", expression_path.display()))?;
    expression.validate()?;

    let article_text = std::fs::read_to_string(article_path)
        .with_context(|| format!("Failed to read article: {}", article_path.display()))?;
    let article: Article = serde_json::from_str(&article_text)
        .with_context(|| format!("Invalid article JSON: {}", article_path.display()))?;

    let evaluator = FilterEvaluator::new(config.regex_timeout());
    let outcome = evaluator.evaluate(Some(&expression), &article)?;

    if outcome.passed {
        println!("PASS");
    } else {
        println!("BLOCKED");
        for explanation in &outcome.explain_blocked {
            println!(
                "  - {} (value: {:?}, filter input: {:?})",
                explanation.message, explanation.reference_value, explanation.filter_input
            );
        }
    }

    Ok(())
}
