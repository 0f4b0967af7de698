//! Evaluation results and traces

use ff_02_bucketing::Exclusion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{EvaluationWarning, FeatureId};

/// Where the returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvaluationSource {
    Force,
    Experiment,
    Rollout,
    DefaultValue,
    /// A feature-level prerequisite failed; the value is `null`
    Prerequisite,
}

impl EvaluationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Experiment => "experiment",
            Self::Rollout => "rollout",
            Self::DefaultValue => "defaultValue",
            Self::Prerequisite => "prerequisite",
        }
    }
}

/// Why a rule did or did not apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RuleOutcome {
    Matched,
    /// A gate rule whose prerequisites all passed
    GatePassed,
    GateFailed { parent: FeatureId, parent_value: Value },
    ParentConditionFailed { parent: FeatureId, parent_value: Value },
    ConditionFailed,
    MissingHashAttribute { attribute: String },
    Excluded { reason: Exclusion },
    SkippedDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub rule_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub tracking_key: String,
    pub variation_index: usize,
    pub variation_key: String,
    pub hash_attribute: String,
    pub hash_value: String,
    /// `None` when the assignment was read from the sticky store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    pub sticky: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub feature_id: FeatureId,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
    pub source: EvaluationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<ExperimentResult>,
    pub trace: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EvaluationResult {
    pub(crate) fn new(feature_id: &str, value: Value, source: EvaluationSource) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            value,
            matched_rule_id: None,
            source,
            experiment: None,
            trace: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, warning: &EvaluationWarning) {
        self.warnings.push(warning.to_string());
    }

    /// Truthiness as SDKs define it for boolean checks.
    pub fn is_on(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}
