//! # Compiled Payload Types
//!
//! Derived structures produced by the Rule Compiler and the Payload Compiler.
//! They are recomputed, never edited directly.

use crate::entities::{
    EnvironmentId, ExperimentStatus, FeatureId, HashVersion, HoldoutId, NamespaceRange,
    OrganizationId, ProjectId, SavedGroupId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current payload schema version.
pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

fn is_false(value: &bool) -> bool {
    !*value
}

/// A condition on another feature's evaluated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentCondition {
    /// Upstream feature key (or `$holdout:<id>`).
    pub id: FeatureId,
    /// Evaluated against `{"value": <upstream value>}`.
    pub condition: Value,
    /// A failing gate turns the whole feature off instead of skipping the rule.
    #[serde(default, skip_serializing_if = "is_false")]
    pub gate: bool,
}

/// A normalized rule ready for evaluation or serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRule {
    /// Stripped for connections without rule-id support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_conditions: Vec<ParentCondition>,
    /// Only present while the underlying experiment is a draft.
    #[serde(default, skip_serializing_if = "is_false")]
    pub draft: bool,
    #[serde(flatten)]
    pub action: RuleAction,
}

impl ResolvedRule {
    pub fn new(id: impl Into<String>, action: RuleAction) -> Self {
        Self {
            id: Some(id.into()),
            condition: None,
            parent_conditions: Vec::new(),
            draft: false,
            action,
        }
    }

    /// Whether one of the parent conditions references `feature_key`.
    pub fn references_parent(&self, feature_key: &str) -> bool {
        self.parent_conditions.iter().any(|p| p.id == feature_key)
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    /// Carries only gating parent conditions; never assigns a value.
    Gate,
    Force(ForceAction),
    Rollout(RolloutAction),
    Experiment(ExperimentAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceAction {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutAction {
    pub value: Value,
    pub coverage: f64,
    pub hash_attribute: String,
    pub seed: String,
    pub hash_version: HashVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAction {
    /// Tracking key.
    pub key: String,
    pub experiment_id: String,
    pub variations: Vec<Value>,
    pub weights: Vec<f64>,
    /// Variation keys, parallel to `variations`.
    pub meta: Vec<String>,
    pub coverage: f64,
    pub hash_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_attribute: Option<String>,
    pub hash_version: HashVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceRange>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_sticky_bucketing: bool,
    #[serde(default)]
    pub bucket_version: u32,
}

/// Default value plus resolved, filtered rule list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFeatureDefinition {
    pub default_value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ResolvedRule>,
    /// Used for project filtering; removed before delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectId>,
}

/// Experiment metadata delivered alongside the features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
    pub key: String,
    pub experiment_id: String,
    pub feature_id: FeatureId,
    pub status: ExperimentStatus,
    pub variations: Vec<String>,
    pub hash_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldoutSummary {
    pub id: HoldoutId,
    pub feature_key: String,
    #[serde(default)]
    pub projects: Vec<ProjectId>,
    #[serde(default)]
    pub feature_ids: Vec<FeatureId>,
    pub coverage: f64,
}

/// `{features, experiments, savedGroupsInUse, holdouts}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadContents {
    #[serde(default)]
    pub features: BTreeMap<FeatureId, CompiledFeatureDefinition>,
    #[serde(default)]
    pub experiments: Vec<ExperimentSummary>,
    /// Values of list saved groups referenced symbolically by the rules.
    #[serde(default)]
    pub saved_groups: BTreeMap<SavedGroupId, Vec<String>>,
    #[serde(default)]
    pub holdouts: BTreeMap<HoldoutId, HoldoutSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_features: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_saved_groups: Option<String>,
}

/// Cache entry keyed by (organization, environment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkPayload {
    pub organization: OrganizationId,
    pub environment: EnvironmentId,
    pub date_updated: DateTime<Utc>,
    /// False while a recompilation has not been committed.
    pub deployed: bool,
    pub schema_version: u32,
    /// Monotonic per-key generation of the refresh that produced it.
    pub generation: u64,
    pub contents: PayloadContents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scheduled_update: Option<DateTime<Utc>>,
    /// Features omitted because of configuration errors, with the message.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<FeatureId, String>,
}

/// Identifies a slice of payloads affected by a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadKey {
    pub environment: EnvironmentId,
    /// `None` for the unscoped (all-project) payload.
    #[serde(default)]
    pub project: Option<ProjectId>,
}

impl PayloadKey {
    pub fn new(environment: impl Into<EnvironmentId>, project: Option<ProjectId>) -> Self {
        Self {
            environment: environment.into(),
            project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gate_rule_serialization() {
        let mut rule = ResolvedRule::new("prereq_1", RuleAction::Gate);
        rule.parent_conditions.push(ParentCondition {
            id: "parent".into(),
            condition: json!({"value": true}),
            gate: true,
        });
        let encoded = serde_json::to_value(&rule).unwrap();
        assert_eq!(encoded["type"], "gate");
        assert_eq!(encoded["parentConditions"][0]["gate"], true);
        assert!(encoded.get("draft").is_none());
    }

    #[test]
    fn test_stripped_id_is_omitted() {
        let mut rule = ResolvedRule::new("r1", RuleAction::Force(ForceAction { value: json!(1) }));
        rule.id = None;
        let encoded = serde_json::to_value(&rule).unwrap();
        assert!(encoded.get("id").is_none());
        assert_eq!(encoded["value"], 1);
    }
}
