//! Staleness Classifier Service
//!
//! Runs the priority chain for each (feature, environment):
//!
//! 1. never-stale, recently-updated, active-draft, has-dependents
//! 2. no-rules, rules-one-sided
//! 3. abandoned-draft, toggled-off, active-experiment
//! 4. has-rules
//!
//! The first link that applies wins. A failure anywhere in the chain
//! yields `error` for that environment only. A feature on a prerequisite
//! cycle is `error` everywhere unless it opted out with never-stale.

use crate::algorithms::one_sided::{is_one_sided, serves_traffic};
use crate::config::StalenessConfig;
use crate::domain::classification::{EnvironmentStaleness, StaleReason, StalenessReport};
use crate::domain::errors::StalenessError;
use crate::ports::inbound::StalenessApi;
use chrono::{DateTime, Duration, Utc};
use ff_01_targeting::validate;
use ff_03_prerequisites::{dependents_of, resolve, Resolution};
use ff_04_rule_compiler::algorithms::environments::effective_settings;
use shared_types::{Environment, ExperimentStatus, Feature, Rule, RuleKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The organization state a classification reads.
#[derive(Debug, Clone, Copy)]
pub struct StalenessContext<'a> {
    /// Every feature of the organization, for dependents and cycles
    pub features: &'a [Feature],
    pub environments: &'a [Environment],
    pub now: DateTime<Utc>,
}

impl<'a> StalenessContext<'a> {
    pub fn new(features: &'a [Feature], environments: &'a [Environment]) -> Self {
        Self {
            features,
            environments,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct StalenessClassifier {
    config: StalenessConfig,
}

impl StalenessClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StalenessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StalenessConfig {
        &self.config
    }

    fn classify_resolved(
        &self,
        feature: &Feature,
        ctx: &StalenessContext<'_>,
        resolution: &Resolution,
    ) -> StalenessReport {
        if !feature.never_stale {
            if let Some(path) = resolution.cyclic.get(&feature.id) {
                let error = StalenessError::Cycle { path: path.clone() };
                warn!(feature_id = %feature.id, error = %error, "Feature is part of a prerequisite cycle");
                let per_environment = ctx
                    .environments
                    .iter()
                    .map(|e| (e.id.clone(), EnvironmentStaleness::error(error.to_string())))
                    .collect();
                return StalenessReport::summarize(feature.id.clone(), per_environment);
            }
        }

        if let Some(reason) = self.feature_level(feature, ctx, resolution) {
            debug!(feature_id = %feature.id, reason = %reason, "Staleness decided at feature level");
            return StalenessReport {
                feature_id: feature.id.clone(),
                stale: false,
                reason,
                per_environment: ctx
                    .environments
                    .iter()
                    .map(|e| (e.id.clone(), EnvironmentStaleness::from_reason(reason)))
                    .collect(),
            };
        }

        let per_environment: BTreeMap<_, _> = ctx
            .environments
            .iter()
            .map(|environment| {
                let result = match self.classify_environment(feature, environment, ctx, resolution) {
                    Ok(reason) => EnvironmentStaleness::from_reason(reason),
                    Err(e) => {
                        warn!(
                            feature_id = %feature.id,
                            environment = %environment.id,
                            error = %e,
                            "Staleness classification failed"
                        );
                        EnvironmentStaleness::error(e.to_string())
                    }
                };
                (environment.id.clone(), result)
            })
            .collect();

        StalenessReport::summarize(feature.id.clone(), per_environment)
    }

    fn feature_level(
        &self,
        feature: &Feature,
        ctx: &StalenessContext<'_>,
        resolution: &Resolution,
    ) -> Option<StaleReason> {
        if feature.never_stale {
            return Some(StaleReason::NeverStale);
        }
        if ctx.now - feature.date_updated < Duration::days(self.config.recently_updated_days) {
            return Some(StaleReason::RecentlyUpdated);
        }
        if feature.draft.is_some() && !self.draft_abandoned(feature, ctx.now) {
            return Some(StaleReason::ActiveDraft);
        }
        if !dependents_of(&resolution.graph, &feature.id).is_empty() {
            return Some(StaleReason::HasDependents);
        }
        None
    }

    fn draft_abandoned(&self, feature: &Feature, now: DateTime<Utc>) -> bool {
        feature.draft.as_ref().map_or(false, |draft| {
            now - draft.date_updated >= Duration::days(self.config.abandoned_draft_days)
        })
    }

    /// Rule-shape and lifecycle links of the chain for one environment.
    pub fn classify_environment(
        &self,
        feature: &Feature,
        environment: &Environment,
        ctx: &StalenessContext<'_>,
        resolution: &Resolution,
    ) -> Result<StaleReason, StalenessError> {
        if let Some(path) = resolution.cyclic.get(&feature.id) {
            return Err(StalenessError::Cycle { path: path.clone() });
        }

        let settings = effective_settings(
            feature,
            environment,
            ctx.environments,
            self.config.max_environment_depth,
        );
        let rules: Vec<&Rule> = settings
            .rules
            .iter()
            .filter(|rule| serves_traffic(rule, ctx.now))
            .collect();

        for rule in &rules {
            if let Some(condition) = &rule.condition {
                validate(condition).map_err(|e| StalenessError::MalformedCondition {
                    rule_id: rule.id.clone(),
                    reason: e.to_string(),
                })?;
            }
        }

        if rules.is_empty() {
            return Ok(StaleReason::NoRules);
        }
        if is_one_sided(&feature.default_value, &rules) {
            return Ok(StaleReason::RulesOneSided);
        }
        if self.draft_abandoned(feature, ctx.now) {
            return Ok(StaleReason::AbandonedDraft);
        }
        if !settings.enabled {
            return Ok(StaleReason::ToggledOff);
        }
        let running = rules.iter().any(|rule| {
            matches!(&rule.kind, RuleKind::Experiment(e) if e.status == ExperimentStatus::Running)
        });
        if running {
            return Ok(StaleReason::ActiveExperiment);
        }
        Ok(StaleReason::HasRules)
    }
}

impl StalenessApi for StalenessClassifier {
    fn classify_staleness(&self, feature: &Feature, ctx: &StalenessContext<'_>) -> StalenessReport {
        let resolution = resolve(ctx.features);
        self.classify_resolved(feature, ctx, &resolution)
    }

    fn classify_all(&self, ctx: &StalenessContext<'_>) -> Vec<StalenessReport> {
        let resolution = resolve(ctx.features);
        ctx.features
            .iter()
            .map(|feature| self.classify_resolved(feature, ctx, &resolution))
            .collect()
    }
}
