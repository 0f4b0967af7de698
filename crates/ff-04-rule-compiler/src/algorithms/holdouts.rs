//! Holdout injection
//!
//! Each holdout compiles to a `$holdout:<id>` pseudo-feature that buckets
//! users into `holdoutcontrol` or `holdouttreatment`. Wrapped features get a
//! leading `Force` rule that serves their default value to the control group.
//!
//! A holdout only gates a feature that carries one of the holdout's projects.
//! A project mismatch drops the rule entirely; it is never applied unscoped.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use shared_types::{
    CompiledFeatureDefinition, ExperimentAction, Feature, ForceAction, Holdout, HoldoutSummary,
    ParentCondition, ResolvedRule, RuleAction, HOLDOUT_CONTROL_VALUE, HOLDOUT_TREATMENT_VALUE,
};

/// Whether `holdout` gates `feature` in `environment`.
pub fn holdout_applies(holdout: &Holdout, feature: &Feature, environment: &str) -> bool {
    holdout.is_running()
        && holdout.is_enabled_in(environment)
        && holdout.feature_ids.contains(&feature.id)
        && holdout.shares_project_with(feature.project.as_ref())
}

/// Gating rules for `feature`, ordered by holdout id.
pub fn holdout_rules(feature: &Feature, environment: &str, holdouts: &[Holdout]) -> Vec<ResolvedRule> {
    let mut applicable: Vec<&Holdout> = holdouts
        .iter()
        .filter(|h| holdout_applies(h, feature, environment))
        .collect();
    applicable.sort_by(|a, b| a.id.cmp(&b.id));

    applicable
        .into_iter()
        .map(|holdout| {
            let mut rule = ResolvedRule::new(
                format!("holdout_{}", holdout.id),
                RuleAction::Force(ForceAction {
                    value: feature.default_value.clone(),
                }),
            );
            rule.parent_conditions.push(ParentCondition {
                id: holdout.feature_key(),
                condition: json!({ "value": HOLDOUT_CONTROL_VALUE }),
                gate: false,
            });
            rule
        })
        .collect()
}

/// The pseudo-feature definition and payload summary of a holdout.
pub fn holdout_feature(holdout: &Holdout, now: DateTime<Utc>) -> (CompiledFeatureDefinition, HoldoutSummary) {
    let coverage = holdout.coverage_at(now);
    let split = holdout.split.clamp(0.0, 1.0);
    let key = holdout.feature_key();

    let rule = ResolvedRule::new(
        format!("holdout_{}", holdout.id),
        RuleAction::Experiment(ExperimentAction {
            key: key.clone(),
            experiment_id: holdout.id.clone(),
            variations: vec![
                Value::from(HOLDOUT_CONTROL_VALUE),
                Value::from(HOLDOUT_TREATMENT_VALUE),
            ],
            weights: vec![split, 1.0 - split],
            meta: vec![
                HOLDOUT_CONTROL_VALUE.to_string(),
                HOLDOUT_TREATMENT_VALUE.to_string(),
            ],
            coverage,
            hash_attribute: holdout.hash_attribute.clone(),
            fallback_attribute: None,
            hash_version: holdout.hash_version,
            namespace: None,
            disable_sticky_bucketing: false,
            bucket_version: 0,
        }),
    );

    let definition = CompiledFeatureDefinition {
        default_value: Value::Null,
        rules: vec![rule],
        project: None,
    };
    let summary = HoldoutSummary {
        id: holdout.id.clone(),
        feature_key: key,
        projects: holdout.projects.clone(),
        feature_ids: holdout.feature_ids.iter().cloned().collect(),
        coverage,
    };
    (definition, summary)
}
