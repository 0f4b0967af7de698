//! # Error Types
//!
//! The error taxonomy shared across subsystems.
//!
//! - `ConfigurationError`: fail closed for the affected feature only.
//! - `CacheConsistencyError`: retried once with a fresh snapshot, then surfaced.
//! - `EvaluationWarning`: resolved to a safe default and logged, never raised.

use crate::entities::{EnvironmentId, FeatureId, OrganizationId, SavedGroupId};
use thiserror::Error;

/// Terminal configuration problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Prerequisite references form a cycle. The path closes on its first id.
    #[error("Cyclic prerequisite: {}", .path.join(" → "))]
    CyclicPrerequisite { path: Vec<FeatureId> },

    #[error("Malformed condition in rule {rule_id}: {reason}")]
    MalformedCondition { rule_id: String, reason: String },

    #[error("Rule {rule_id} references a saved group with an empty id list")]
    EmptySavedGroupReference { rule_id: String },

    #[error("Rule {rule_id} references unknown saved group {group_id}")]
    UnknownSavedGroup {
        rule_id: String,
        group_id: SavedGroupId,
    },

    #[error("Rule {rule_id} has invalid variations: {reason}")]
    InvalidVariations { rule_id: String, reason: String },

    #[error("Rule {rule_id} has coverage {coverage} outside [0, 1]")]
    InvalidCoverage { rule_id: String, coverage: f64 },
}

impl ConfigurationError {
    /// The rule the error is attached to, if any.
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::CyclicPrerequisite { .. } => None,
            Self::MalformedCondition { rule_id, .. }
            | Self::EmptySavedGroupReference { rule_id }
            | Self::UnknownSavedGroup { rule_id, .. }
            | Self::InvalidVariations { rule_id, .. }
            | Self::InvalidCoverage { rule_id, .. } => Some(rule_id),
        }
    }
}

/// A torn read or write at the cache boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheConsistencyError {
    #[error("Snapshot of {organization} changed during compilation: revision {before} -> {after}")]
    SnapshotChanged {
        organization: OrganizationId,
        before: u64,
        after: u64,
    },

    #[error("Payload for {organization}/{environment} was loaded before it was deployed")]
    NotDeployed {
        organization: OrganizationId,
        environment: EnvironmentId,
    },
}

/// Non-fatal evaluation problems; the evaluator falls back to no-match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationWarning {
    #[error("Unknown operator {operator}")]
    UnknownOperator { operator: String },

    #[error("Invalid operand for {operator}")]
    InvalidOperand { operator: String },

    #[error("Invalid regex {pattern}")]
    InvalidRegex { pattern: String },

    #[error("Missing hash attribute {attribute}")]
    MissingAttribute { attribute: String },

    #[error("Unknown saved group {group_id}")]
    UnknownSavedGroup { group_id: SavedGroupId },

    #[error("Prerequisite {feature_id} is not part of the payload")]
    UnknownPrerequisite { feature_id: FeatureId },
}
