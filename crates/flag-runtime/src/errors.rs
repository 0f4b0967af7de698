//! Facade errors

use crate::container::config::ConfigError;
use ff_03_prerequisites::CycleError;
use ff_05_payload_cache::PayloadError;
use ff_07_sample_evaluator::EvaluationError;
use shared_types::{ConnectionId, FeatureId, OrganizationId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The edit would close a prerequisite cycle
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Unknown feature {feature_id} in {organization}")]
    UnknownFeature {
        organization: OrganizationId,
        feature_id: FeatureId,
    },

    /// The feature was left out of the payload by a configuration error
    #[error("Feature {feature_id} is excluded: {reason}")]
    FeatureExcluded { feature_id: FeatureId, reason: String },

    #[error("Connection {connection_id} does not use remote evaluation")]
    RemoteEvaluationDisabled { connection_id: ConnectionId },
}
