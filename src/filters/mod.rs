//! Filter expressions gating article delivery
//!
//! A filter is a tree of logical (`AND`/`OR`) and relational (`EQ`,
//! `CONTAINS`, `MATCHES`) nodes evaluated against a flattened article.
//! Evaluation produces a pass/fail verdict plus "explain blocked"
//! diagnostics describing why a relational leaf rejected the article.
//!
//! The tree is a closed sum type with exhaustive matching; destinations
//! store it as JSON in the shape
//!
//! ```json
//! {
//!   "type": "LOGICAL",
//!   "op": "AND",
//!   "children": [
//!     {
//!       "type": "RELATIONAL",
//!       "op": "CONTAINS",
//!       "not": false,
//!       "left": { "type": "ARTICLE", "value": "title" },
//!       "right": { "type": "STRING", "value": "rust" }
//!     }
//!   ]
//! }
//! ```

mod evaluate;
mod regex;

pub use self::evaluate::{FilterEvaluator, FilterOutcome};
pub use self::regex::test_pattern;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum nesting depth accepted from user-supplied expressions
pub const MAX_EXPRESSION_DEPTH: usize = 10;

/// Errors surfaced by filter validation and evaluation
///
/// Evaluation errors are propagated to the caller, never folded into a
/// pass or fail verdict: a silently-passing bad filter could misroute
/// content and a silently-failing one could block all delivery.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    /// Regex literal failed to compile
    #[error("invalid filter regex {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Regex evaluation exceeded the wall-clock budget
    #[error("filter regex {pattern:?} timed out after {timeout_ms}ms")]
    PatternTimeout { pattern: String, timeout_ms: u64 },

    /// Expression tree nested deeper than [`MAX_EXPRESSION_DEPTH`]
    #[error("filter expression exceeds maximum depth of {max_depth}")]
    TooDeep { max_depth: usize },

    /// The regex worker thread could not be spawned
    #[error("filter regex worker failed: {reason}")]
    WorkerFailed { reason: String },
}

impl FilterError {
    /// Check if the error is recoverable (worth retrying later)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WorkerFailed { .. })
    }
}

/// Logical operators over child expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

/// Relational comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationalOp {
    /// Exact string equality
    Eq,
    /// Case-insensitive substring containment
    Contains,
    /// Case-insensitive regex match
    Matches,
}

/// Left side of a relational node: a named article field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelationalLeft {
    #[serde(rename = "ARTICLE")]
    Article { value: String },
}

impl RelationalLeft {
    /// The article field name being compared
    pub fn field_name(&self) -> &str {
        match self {
            Self::Article { value } => value,
        }
    }
}

/// Right side of a relational node: a literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelationalRight {
    #[serde(rename = "STRING")]
    String { value: String },
}

impl RelationalRight {
    /// The literal value being compared against
    pub fn literal(&self) -> &str {
        match self {
            Self::String { value } => value,
        }
    }
}

/// A relational comparison leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalExpression {
    pub op: RelationalOp,

    /// Invert the verdict after evaluation
    #[serde(default)]
    pub not: bool,

    pub left: RelationalLeft,
    pub right: RelationalRight,
}

impl RelationalExpression {
    /// Convenience constructor for a field-vs-literal comparison
    pub fn new(op: RelationalOp, field: impl Into<String>, literal: impl Into<String>) -> Self {
        Self {
            op,
            not: false,
            left: RelationalLeft::Article {
                value: field.into(),
            },
            right: RelationalRight::String {
                value: literal.into(),
            },
        }
    }

    /// Builder-style negation
    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

/// A logical combinator over child expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub op: LogicalOp,

    #[serde(default)]
    pub children: Vec<FilterExpression>,
}

/// A filter expression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterExpression {
    #[serde(rename = "LOGICAL")]
    Logical(LogicalExpression),

    #[serde(rename = "RELATIONAL")]
    Relational(RelationalExpression),
}

impl FilterExpression {
    /// Build an AND node
    pub fn and(children: Vec<FilterExpression>) -> Self {
        Self::Logical(LogicalExpression {
            op: LogicalOp::And,
            children,
        })
    }

    /// Build an OR node
    pub fn or(children: Vec<FilterExpression>) -> Self {
        Self::Logical(LogicalExpression {
            op: LogicalOp::Or,
            children,
        })
    }

    /// Build a relational leaf
    pub fn relational(op: RelationalOp, field: impl Into<String>, literal: impl Into<String>) -> Self {
        Self::Relational(RelationalExpression::new(op, field, literal))
    }

    /// Validate structural constraints on a user-supplied expression
    ///
    /// serde already enforces the node shapes; this checks the nesting
    /// depth bound so adversarial input cannot build arbitrarily deep
    /// recursion.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.check_depth(0)
    }

    fn check_depth(&self, depth: usize) -> Result<(), FilterError> {
        if depth >= MAX_EXPRESSION_DEPTH {
            return Err(FilterError::TooDeep {
                max_depth: MAX_EXPRESSION_DEPTH,
            });
        }
        if let Self::Logical(logical) = self {
            for child in &logical.children {
                child.check_depth(depth + 1)?;
            }
        }
        Ok(())
    }
}

/// Why a relational leaf rejected an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Human-readable reason
    pub message: String,

    /// The article value that was compared
    pub reference_value: Option<String>,

    /// The literal it was compared against
    pub filter_input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_json_wire_shape() {
        let expr = FilterExpression::and(vec![FilterExpression::relational(
            RelationalOp::Contains,
            "title",
            "rust",
        )]);

        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], "LOGICAL");
        assert_eq!(json["op"], "AND");
        assert_eq!(json["children"][0]["type"], "RELATIONAL");
        assert_eq!(json["children"][0]["op"], "CONTAINS");
        assert_eq!(json["children"][0]["left"]["type"], "ARTICLE");
        assert_eq!(json["children"][0]["left"]["value"], "title");
        assert_eq!(json["children"][0]["right"]["type"], "STRING");
        assert_eq!(json["children"][0]["right"]["value"], "rust");
    }

    #[test]
    fn test_expression_roundtrip() {
        let expr = FilterExpression::or(vec![
            FilterExpression::relational(RelationalOp::Eq, "guid", "abc"),
            FilterExpression::Relational(
                RelationalExpression::new(RelationalOp::Matches, "title", "^breaking").negated(),
            ),
        ]);

        let json = serde_json::to_string(&expr).unwrap();
        let restored: FilterExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, expr);
    }

    #[test]
    fn test_not_defaults_to_false() {
        let json = r#"{
            "type": "RELATIONAL",
            "op": "EQ",
            "left": { "type": "ARTICLE", "value": "title" },
            "right": { "type": "STRING", "value": "a" }
        }"#;
        let expr: FilterExpression = serde_json::from_str(json).unwrap();
        match expr {
            FilterExpression::Relational(rel) => assert!(!rel.not),
            _ => panic!("expected relational node"),
        }
    }

    #[test]
    fn test_unknown_expression_type_rejected() {
        let json = r#"{ "type": "TERNARY", "op": "EQ" }"#;
        assert!(serde_json::from_str::<FilterExpression>(json).is_err());
    }

    #[test]
    fn test_depth_validation() {
        let mut expr = FilterExpression::relational(RelationalOp::Eq, "title", "x");
        for _ in 0..(MAX_EXPRESSION_DEPTH - 1) {
            expr = FilterExpression::and(vec![expr]);
        }
        assert!(expr.validate().is_ok());

        let too_deep = FilterExpression::and(vec![expr]);
        assert_eq!(
            too_deep.validate(),
            Err(FilterError::TooDeep {
                max_depth: MAX_EXPRESSION_DEPTH
            })
        );
    }
}
