//! Error types for the Staleness Classifier

use shared_types::FeatureId;
use thiserror::Error;

/// Why an environment could not be classified. Reported as `error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StalenessError {
    #[error("Cyclic prerequisite: {}", .path.join(" → "))]
    Cycle { path: Vec<FeatureId> },

    #[error("Malformed condition in rule {rule_id}: {reason}")]
    MalformedCondition { rule_id: String, reason: String },
}
