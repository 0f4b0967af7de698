//! Sample Evaluator Service
//!
//! Walks a compiled rule list the way an SDK would and records why each
//! rule did or did not apply. Parent conditions evaluate the referenced
//! feature first. Bucketing reads sticky assignments but never writes them.

use crate::algorithms::hash_value::hash_value;
use crate::config::EvaluatorConfig;
use crate::domain::context::EvaluationContext;
use crate::domain::errors::EvaluationError;
use crate::domain::result::{
    EvaluationResult, EvaluationSource, ExperimentResult, RuleOutcome, TraceEntry,
};
use crate::ports::inbound::SampleEvaluatorApi;
use async_trait::async_trait;
use ff_01_targeting::{evaluate_traced, evaluate_value_traced};
use ff_02_bucketing::{
    hash_fraction, hash_seed, AssignmentOutcome, AssignmentRequest, AssignmentSource,
    BucketingService, Exclusion,
};
use flag_telemetry::SAMPLE_EVALUATIONS;
use serde_json::{json, Value};
use shared_types::{EvaluationWarning, FeatureId, RuleAction, HOLDOUT_FEATURE_PREFIX};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct SampleEvaluator {
    bucketing: BucketingService,
    config: EvaluatorConfig,
}

impl SampleEvaluator {
    pub fn new() -> Self {
        Self::with_bucketing(BucketingService::default())
    }

    /// Evaluator reading sticky assignments through `bucketing`.
    pub fn with_bucketing(bucketing: BucketingService) -> Self {
        Self {
            bucketing,
            config: EvaluatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    fn evaluate_feature<'a>(
        &'a self,
        feature_id: &'a str,
        ctx: &'a EvaluationContext<'a>,
        mut stack: Vec<FeatureId>,
    ) -> BoxFuture<'a, Result<EvaluationResult, EvaluationError>> {
        Box::pin(async move {
            let definition = ctx.features.get(feature_id).ok_or_else(|| {
                EvaluationError::UnknownFeature {
                    feature_id: feature_id.to_string(),
                }
            })?;
            stack.push(feature_id.to_string());

            let mut result = EvaluationResult::new(
                feature_id,
                definition.default_value.clone(),
                EvaluationSource::DefaultValue,
            );

            'rules: for (rule_index, rule) in definition.rules.iter().enumerate() {
                let entry = |outcome: RuleOutcome| TraceEntry {
                    rule_index,
                    rule_id: rule.id.clone(),
                    outcome,
                };

                if rule.draft && !self.config.include_drafts {
                    result.trace.push(entry(RuleOutcome::SkippedDraft));
                    continue;
                }

                for parent in &rule.parent_conditions {
                    let parent_value = if stack.contains(&parent.id) {
                        let mut path = stack.clone();
                        path.push(parent.id.clone());
                        return Err(EvaluationError::ParentCycle { path });
                    } else if stack.len() > self.config.max_parent_depth {
                        return Err(EvaluationError::TooDeep {
                            max_depth: self.config.max_parent_depth,
                        });
                    } else if ctx.features.contains_key(&parent.id) {
                        self.evaluate_feature(&parent.id, ctx, stack.clone())
                            .await?
                            .value
                    } else {
                        result.warn(&EvaluationWarning::UnknownPrerequisite {
                            feature_id: parent.id.clone(),
                        });
                        Value::Null
                    };

                    let check =
                        evaluate_value_traced(&parent.condition, &json!({ "value": parent_value }), None);
                    for warning in &check.warnings {
                        result.warn(warning);
                    }
                    if check.matched {
                        continue;
                    }

                    if parent.gate {
                        result.trace.push(entry(RuleOutcome::GateFailed {
                            parent: parent.id.clone(),
                            parent_value,
                        }));
                        result.value = Value::Null;
                        result.source = EvaluationSource::Prerequisite;
                        result.matched_rule_id = rule.id.clone();
                        return Ok(result);
                    }
                    result.trace.push(entry(RuleOutcome::ParentConditionFailed {
                        parent: parent.id.clone(),
                        parent_value,
                    }));
                    continue 'rules;
                }

                if let Some(condition) = &rule.condition {
                    let check = evaluate_traced(condition, ctx.attributes, Some(ctx.saved_groups));
                    for warning in &check.warnings {
                        result.warn(warning);
                    }
                    if !check.matched {
                        result.trace.push(entry(RuleOutcome::ConditionFailed));
                        continue;
                    }
                }

                match &rule.action {
                    RuleAction::Gate => {
                        result.trace.push(entry(RuleOutcome::GatePassed));
                    }
                    RuleAction::Force(force) => {
                        result.trace.push(entry(RuleOutcome::Matched));
                        result.value = force.value.clone();
                        result.source = EvaluationSource::Force;
                        result.matched_rule_id = rule.id.clone();
                        return Ok(result);
                    }
                    RuleAction::Rollout(rollout) => {
                        let Some((_, value)) = hash_value(ctx.attributes, &rollout.hash_attribute, None)
                        else {
                            result.warn(&EvaluationWarning::MissingAttribute {
                                attribute: rollout.hash_attribute.clone(),
                            });
                            result.trace.push(entry(RuleOutcome::MissingHashAttribute {
                                attribute: rollout.hash_attribute.clone(),
                            }));
                            continue;
                        };
                        let fraction =
                            hash_fraction(&hash_seed(&rollout.seed, &value), rollout.hash_version);
                        if fraction >= rollout.coverage {
                            result.trace.push(entry(RuleOutcome::Excluded {
                                reason: Exclusion::NotInCoverage,
                            }));
                            continue;
                        }
                        result.trace.push(entry(RuleOutcome::Matched));
                        result.value = rollout.value.clone();
                        result.source = EvaluationSource::Rollout;
                        result.matched_rule_id = rule.id.clone();
                        return Ok(result);
                    }
                    RuleAction::Experiment(experiment) => {
                        let Some((attribute, value)) = hash_value(
                            ctx.attributes,
                            &experiment.hash_attribute,
                            experiment.fallback_attribute.as_deref(),
                        ) else {
                            result.warn(&EvaluationWarning::MissingAttribute {
                                attribute: experiment.hash_attribute.clone(),
                            });
                            result.trace.push(entry(RuleOutcome::MissingHashAttribute {
                                attribute: experiment.hash_attribute.clone(),
                            }));
                            continue;
                        };

                        let request = AssignmentRequest {
                            tracking_key: experiment.key.clone(),
                            hash_attribute: attribute.clone(),
                            hash_value: value.clone(),
                            hash_version: experiment.hash_version,
                            variation_keys: experiment.meta.clone(),
                            weights: experiment.weights.clone(),
                            coverage: experiment.coverage,
                            namespace: experiment.namespace.clone(),
                            sticky: !experiment.disable_sticky_bucketing,
                            bucket_version: experiment.bucket_version,
                        };
                        match self.bucketing.assign(&request, false).await? {
                            AssignmentOutcome::Assigned(assignment) => {
                                result.trace.push(entry(RuleOutcome::Matched));
                                result.value = experiment
                                    .variations
                                    .get(assignment.variation)
                                    .cloned()
                                    .unwrap_or(Value::Null);
                                result.source = EvaluationSource::Experiment;
                                result.matched_rule_id = rule.id.clone();
                                result.experiment = Some(ExperimentResult {
                                    experiment_id: experiment.experiment_id.clone(),
                                    tracking_key: experiment.key.clone(),
                                    variation_index: assignment.variation,
                                    variation_key: experiment
                                        .meta
                                        .get(assignment.variation)
                                        .cloned()
                                        .unwrap_or_else(|| assignment.variation.to_string()),
                                    hash_attribute: attribute,
                                    hash_value: value,
                                    fraction: assignment.fraction,
                                    sticky: assignment.source == AssignmentSource::Sticky,
                                });
                                return Ok(result);
                            }
                            AssignmentOutcome::Excluded { reason } => {
                                result.trace.push(entry(RuleOutcome::Excluded { reason }));
                            }
                        }
                    }
                }
            }

            Ok(result)
        })
    }
}

impl Default for SampleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleEvaluatorApi for SampleEvaluator {
    async fn evaluate(
        &self,
        feature_id: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<EvaluationResult, EvaluationError> {
        let result = self.evaluate_feature(feature_id, ctx, Vec::new()).await?;
        SAMPLE_EVALUATIONS
            .with_label_values(&[result.source.as_str()])
            .inc();
        debug!(
            feature_id = %feature_id,
            source = result.source.as_str(),
            rule_id = ?result.matched_rule_id,
            rules_checked = result.trace.len(),
            "Sample evaluated"
        );
        Ok(result)
    }

    async fn evaluate_all(
        &self,
        ctx: &EvaluationContext<'_>,
    ) -> BTreeMap<FeatureId, EvaluationResult> {
        let mut results = BTreeMap::new();
        for feature_id in ctx.features.keys() {
            if feature_id.starts_with(HOLDOUT_FEATURE_PREFIX) {
                continue;
            }
            match self.evaluate(feature_id, ctx).await {
                Ok(result) => {
                    results.insert(feature_id.clone(), result);
                }
                Err(e) => warn!(feature_id = %feature_id, error = %e, "Evaluation failed"),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_02_bucketing::{
        choose_variation, BucketingConfig, InMemoryStickyBucketStore, StickyAssignmentKey,
        StickyBucketStore,
    };
    use shared_types::{
        Attributes, CompiledFeatureDefinition, ExperimentAction, ForceAction, HashVersion,
        ParentCondition, ResolvedRule, RolloutAction,
    };
    use std::sync::Arc;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn definition(default_value: Value, rules: Vec<ResolvedRule>) -> CompiledFeatureDefinition {
        CompiledFeatureDefinition {
            default_value,
            rules,
            project: None,
        }
    }

    fn experiment_rule(id: &str) -> ResolvedRule {
        ResolvedRule::new(
            id,
            RuleAction::Experiment(ExperimentAction {
                key: "F".into(),
                experiment_id: "exp_1".into(),
                variations: vec![json!("control"), json!("treatment")],
                weights: vec![0.5, 0.5],
                meta: vec!["0".into(), "1".into()],
                coverage: 1.0,
                hash_attribute: "id".into(),
                fallback_attribute: None,
                hash_version: HashVersion::V2,
                namespace: None,
                disable_sticky_bucketing: false,
                bucket_version: 0,
            }),
        )
    }

    fn rollout_rule(coverage: f64) -> ResolvedRule {
        ResolvedRule::new(
            "ro",
            RuleAction::Rollout(RolloutAction {
                value: json!(true),
                coverage,
                hash_attribute: "id".into(),
                seed: "F".into(),
                hash_version: HashVersion::V1,
            }),
        )
    }

    fn force(id: &str, value: Value) -> ResolvedRule {
        ResolvedRule::new(id, RuleAction::Force(ForceAction { value }))
    }

    async fn run(
        evaluator: &SampleEvaluator,
        features: &BTreeMap<FeatureId, CompiledFeatureDefinition>,
        feature_id: &str,
        attributes: Value,
    ) -> Result<EvaluationResult, EvaluationError> {
        let groups = BTreeMap::new();
        let attributes = attrs(attributes);
        let ctx = EvaluationContext::new(features, &groups, &attributes);
        evaluator.evaluate(feature_id, &ctx).await
    }

    #[tokio::test]
    async fn test_untargeted_force_rule() {
        let features =
            BTreeMap::from([("F".to_string(), definition(json!("off"), vec![force("r1", json!("on"))]))]);
        let evaluator = SampleEvaluator::new();

        for attributes in [json!({}), json!({"id": "u1", "country": "NZ"})] {
            let result = run(&evaluator, &features, "F", attributes).await.unwrap();
            assert_eq!(result.value, json!("on"));
            assert_eq!(result.source, EvaluationSource::Force);
            assert_eq!(result.matched_rule_id.as_deref(), Some("r1"));
        }
    }

    #[tokio::test]
    async fn test_experiment_matches_direct_bucketing() {
        let features = BTreeMap::from([(
            "F".to_string(),
            definition(json!("default"), vec![experiment_rule("e1")]),
        )]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({"id": "u1"}))
            .await
            .unwrap();

        let expected = choose_variation(hash_fraction("F_u1", HashVersion::V2), &[0.5, 0.5]).unwrap();
        let experiment = result.experiment.clone().unwrap();
        assert_eq!(experiment.variation_index, expected);
        assert_eq!(result.source, EvaluationSource::Experiment);
        assert_eq!(result.value, [json!("control"), json!("treatment")][expected]);
    }

    #[tokio::test]
    async fn test_rollout_coverage_boundary_is_exclusive() {
        // "F_u1" hashes to exactly 0.94 under v1.
        let evaluator = SampleEvaluator::new();
        let at_boundary =
            BTreeMap::from([("F".to_string(), definition(json!(false), vec![rollout_rule(0.94)]))]);
        let result = run(&evaluator, &at_boundary, "F", json!({"id": "u1"})).await.unwrap();
        assert_eq!(result.source, EvaluationSource::DefaultValue);
        assert_eq!(
            result.trace[0].outcome,
            RuleOutcome::Excluded {
                reason: Exclusion::NotInCoverage
            }
        );

        let above =
            BTreeMap::from([("F".to_string(), definition(json!(false), vec![rollout_rule(0.95)]))]);
        let result = run(&evaluator, &above, "F", json!({"id": "u1"})).await.unwrap();
        assert_eq!(result.source, EvaluationSource::Rollout);
        assert_eq!(result.value, json!(true));
    }

    #[tokio::test]
    async fn test_missing_hash_attribute_falls_through() {
        let features = BTreeMap::from([(
            "F".to_string(),
            definition(json!("default"), vec![experiment_rule("e1")]),
        )]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({"country": "US"}))
            .await
            .unwrap();
        assert_eq!(result.value, json!("default"));
        assert_eq!(result.source, EvaluationSource::DefaultValue);
        assert!(matches!(
            result.trace[0].outcome,
            RuleOutcome::MissingHashAttribute { .. }
        ));
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_condition_trace() {
        let targeted = {
            let mut rule = force("us", json!("us"));
            rule.condition = Some(json!({"country": "US"}));
            rule
        };
        let features = BTreeMap::from([(
            "F".to_string(),
            definition(json!("default"), vec![targeted, force("all", json!("all"))]),
        )]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({"country": "NZ"}))
            .await
            .unwrap();
        assert_eq!(result.value, json!("all"));
        assert_eq!(result.trace.len(), 2);
        assert_eq!(result.trace[0].outcome, RuleOutcome::ConditionFailed);
        assert_eq!(result.trace[0].rule_id.as_deref(), Some("us"));
    }

    #[tokio::test]
    async fn test_failed_gate_turns_feature_off() {
        let mut gate = ResolvedRule::new("prereq_F", RuleAction::Gate);
        gate.parent_conditions.push(ParentCondition {
            id: "parent".into(),
            condition: json!({"value": true}),
            gate: true,
        });
        let features = BTreeMap::from([
            ("parent".to_string(), definition(json!(false), vec![])),
            (
                "F".to_string(),
                definition(json!("default"), vec![gate, force("r1", json!("on"))]),
            ),
        ]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({})).await.unwrap();
        assert_eq!(result.value, Value::Null);
        assert_eq!(result.source, EvaluationSource::Prerequisite);
        assert_eq!(result.matched_rule_id.as_deref(), Some("prereq_F"));
    }

    #[tokio::test]
    async fn test_passed_gate_and_failed_rule_parent() {
        let mut gate = ResolvedRule::new("prereq_F", RuleAction::Gate);
        gate.parent_conditions.push(ParentCondition {
            id: "parent".into(),
            condition: json!({"value": true}),
            gate: true,
        });
        let mut dependent = force("needs_other", json!("x"));
        dependent.parent_conditions.push(ParentCondition {
            id: "other".into(),
            condition: json!({"value": "yes"}),
            gate: false,
        });
        let features = BTreeMap::from([
            ("parent".to_string(), definition(json!(true), vec![])),
            ("other".to_string(), definition(json!("no"), vec![])),
            (
                "F".to_string(),
                definition(json!("default"), vec![gate, dependent]),
            ),
        ]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({})).await.unwrap();
        assert_eq!(result.value, json!("default"));
        assert_eq!(result.trace[0].outcome, RuleOutcome::GatePassed);
        assert_eq!(
            result.trace[1].outcome,
            RuleOutcome::ParentConditionFailed {
                parent: "other".into(),
                parent_value: json!("no")
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_parent_is_null_with_warning() {
        let mut rule = force("r1", json!("on"));
        rule.parent_conditions.push(ParentCondition {
            id: "ghost".into(),
            condition: json!({"value": {"$exists": false}}),
            gate: false,
        });
        let features = BTreeMap::from([("F".to_string(), definition(json!("off"), vec![rule]))]);
        let result = run(&SampleEvaluator::new(), &features, "F", json!({})).await.unwrap();
        assert_eq!(result.value, json!("on"));
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_parent_cycle_and_unknown_feature() {
        let mut a = force("a1", json!(1));
        a.parent_conditions.push(ParentCondition {
            id: "B".into(),
            condition: json!({"value": 1}),
            gate: false,
        });
        let mut b = force("b1", json!(1));
        b.parent_conditions.push(ParentCondition {
            id: "A".into(),
            condition: json!({"value": 1}),
            gate: false,
        });
        let features = BTreeMap::from([
            ("A".to_string(), definition(json!(0), vec![a])),
            ("B".to_string(), definition(json!(0), vec![b])),
        ]);
        let evaluator = SampleEvaluator::new();
        let err = run(&evaluator, &features, "A", json!({})).await.unwrap_err();
        assert_eq!(
            err,
            EvaluationError::ParentCycle {
                path: vec!["A".into(), "B".into(), "A".into()]
            }
        );

        let err = run(&evaluator, &features, "missing", json!({})).await.unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownFeature { .. }));
    }

    #[tokio::test]
    async fn test_draft_rules_skipped_by_default() {
        let mut draft = force("d1", json!("draft"));
        draft.draft = true;
        let features = BTreeMap::from([("F".to_string(), definition(json!("live"), vec![draft]))]);

        let result = run(&SampleEvaluator::new(), &features, "F", json!({})).await.unwrap();
        assert_eq!(result.value, json!("live"));
        assert_eq!(result.trace[0].outcome, RuleOutcome::SkippedDraft);

        let preview = SampleEvaluator::new().with_config(EvaluatorConfig {
            include_drafts: true,
            ..Default::default()
        });
        let result = run(&preview, &features, "F", json!({})).await.unwrap();
        assert_eq!(result.value, json!("draft"));
    }

    #[tokio::test]
    async fn test_sticky_assignments_are_read_not_written() {
        let store = Arc::new(InMemoryStickyBucketStore::new());
        store
            .put_assignment(StickyAssignmentKey::new("id", "u1", "F", 0), "1".into())
            .await
            .unwrap();
        let evaluator = SampleEvaluator::with_bucketing(BucketingService::with_sticky_store(
            BucketingConfig::default(),
            store.clone(),
        ));
        let features = BTreeMap::from([(
            "F".to_string(),
            definition(json!("default"), vec![experiment_rule("e1")]),
        )]);

        let sticky = run(&evaluator, &features, "F", json!({"id": "u1"})).await.unwrap();
        assert_eq!(sticky.value, json!("treatment"));
        assert!(sticky.experiment.unwrap().sticky);

        run(&evaluator, &features, "F", json!({"id": "u2"})).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_all_skips_holdout_features() {
        let features = BTreeMap::from([
            ("F".to_string(), definition(json!(1), vec![])),
            ("$holdout:h1".to_string(), definition(json!("holdouttreatment"), vec![])),
            ("G".to_string(), definition(json!(2), vec![])),
        ]);
        let groups = BTreeMap::new();
        let attributes = Attributes::new();
        let ctx = EvaluationContext::new(&features, &groups, &attributes);
        let results = SampleEvaluator::new().evaluate_all(&ctx).await;
        assert_eq!(results.keys().cloned().collect::<Vec<_>>(), vec!["F", "G"]);
    }
}
