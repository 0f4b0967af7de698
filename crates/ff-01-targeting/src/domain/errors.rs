//! Error types for Targeting

use thiserror::Error;

/// Structural problems found by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// Condition (or a nested clause) is not a JSON object
    #[error("Condition must be an object, got {found}")]
    NotAnObject { found: String },

    /// Operator is not part of the supported set
    #[error("Unknown operator {operator}")]
    UnknownOperator { operator: String },

    /// Operator argument has the wrong shape
    #[error("Operator {operator} expects {expected}")]
    InvalidOperand { operator: String, expected: String },

    /// `$regex` pattern does not compile
    #[error("Invalid regex {pattern}: {reason}")]
    InvalidRegex { pattern: String, reason: String },
}
