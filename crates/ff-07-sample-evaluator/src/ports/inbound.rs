//! Inbound Ports (Driving Ports)

use crate::domain::context::EvaluationContext;
use crate::domain::errors::EvaluationError;
use crate::domain::result::EvaluationResult;
use async_trait::async_trait;
use shared_types::FeatureId;
use std::collections::BTreeMap;

/// Primary Sample Evaluator API (Driving Port)
#[async_trait]
pub trait SampleEvaluatorApi: Send + Sync {
    /// Evaluate one feature with a full rule trace. Never writes sticky
    /// bucketing state.
    async fn evaluate(
        &self,
        feature_id: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<EvaluationResult, EvaluationError>;

    /// Evaluate every feature of the context, skipping holdout
    /// pseudo-features. A feature that fails is left out.
    async fn evaluate_all(
        &self,
        ctx: &EvaluationContext<'_>,
    ) -> BTreeMap<FeatureId, EvaluationResult>;
}
