//! Error types for the Sample Evaluator

use ff_02_bucketing::BucketingError;
use shared_types::FeatureId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Feature {feature_id} is not part of the compiled payload")]
    UnknownFeature { feature_id: FeatureId },

    /// Parent conditions loop back on a feature already being evaluated
    #[error("Parent conditions form a cycle: {}", .path.join(" → "))]
    ParentCycle { path: Vec<FeatureId> },

    #[error("Parent conditions nested deeper than {max_depth}")]
    TooDeep { max_depth: usize },

    #[error(transparent)]
    Bucketing(#[from] BucketingError),
}
