//! "One-sided" rule detection
//!
//! Collects every value the rule list can serve and reports the list as
//! one-sided when that set has a single member. Conditions are opaque: a
//! targeted rule may or may not match, so its value and everything after it
//! stay reachable. Only an untargeted rule that covers all traffic cuts the
//! list short. Feature-level prerequisites are not considered.

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared_types::{ExperimentStatus, Rule, RuleKind};

/// Whether `rule` serves traffic at `now`.
pub fn serves_traffic(rule: &Rule, now: DateTime<Utc>) -> bool {
    if !rule.enabled {
        return false;
    }
    if let Some(schedule) = &rule.schedule {
        if !schedule.is_active(now) {
            return false;
        }
    }
    match &rule.kind {
        RuleKind::Experiment(experiment) => match experiment.status {
            ExperimentStatus::Draft => false,
            ExperimentStatus::Stopped => experiment.released_variation.is_some(),
            ExperimentStatus::Running => true,
        },
        _ => true,
    }
}

/// Values a user can receive from `rules`, falling back to `default`.
pub fn reachable_values(default: &Value, rules: &[&Rule]) -> Vec<Value> {
    let mut values = Vec::new();
    for rule in rules {
        for value in rule_values(rule) {
            push_unique(&mut values, value);
        }
        if covers_everyone(rule) {
            return values;
        }
    }
    push_unique(&mut values, default.clone());
    values
}

pub fn is_one_sided(default: &Value, rules: &[&Rule]) -> bool {
    reachable_values(default, rules).len() <= 1
}

fn rule_values(rule: &Rule) -> Vec<Value> {
    match &rule.kind {
        RuleKind::Force(force) => vec![force.value.clone()],
        RuleKind::Rollout(rollout) => vec![rollout.value.clone()],
        RuleKind::Experiment(experiment) => match experiment.released_variation {
            Some(index) if experiment.status == ExperimentStatus::Stopped => experiment
                .variations
                .get(index)
                .map(|v| vec![v.value.clone()])
                .unwrap_or_default(),
            _ => experiment
                .variations
                .iter()
                .filter(|v| v.weight > 0.0)
                .map(|v| v.value.clone())
                .collect(),
        },
    }
}

fn covers_everyone(rule: &Rule) -> bool {
    if !rule.is_untargeted() {
        return false;
    }
    match &rule.kind {
        RuleKind::Force(_) => true,
        RuleKind::Rollout(rollout) => rollout.coverage >= 1.0,
        RuleKind::Experiment(experiment) => {
            experiment.status == ExperimentStatus::Stopped
                || (experiment.coverage >= 1.0 && experiment.namespace.is_none())
        }
    }
}

fn push_unique(values: &mut Vec<Value>, value: Value) {
    if !values.contains(&value) {
        values.push(value);
    }
}
