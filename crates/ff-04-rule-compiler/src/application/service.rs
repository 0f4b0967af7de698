//! Rule Compiler Service

use crate::algorithms::conditions::{combine_conditions, is_empty_condition};
use crate::algorithms::environments::effective_settings;
use crate::algorithms::holdouts::{holdout_feature, holdout_rules};
use crate::algorithms::rule_ids::{normalize_rule_id, RuleIdAllocator};
use crate::algorithms::saved_groups::expand_saved_groups;
use crate::config::CompilerConfig;
use crate::domain::compiled::{earliest, CompileWarning, CompiledEnvironment, CompiledFeature};
use crate::domain::context::CompileContext;
use crate::domain::errors::CompileError;
use ff_01_targeting::validate;
use ff_02_bucketing::{bucket_ranges, BucketingError};
use ff_03_prerequisites::{build_graph, detect_cycle, resolve, CycleError};
use serde_json::Value;
use shared_types::{
    CompiledFeatureDefinition, ConfigurationError, ExperimentAction, ExperimentRef,
    ExperimentStatus, ExperimentSummary, Feature, ForceAction, ParentCondition, ResolvedRule,
    RolloutAction, Rule, RuleAction, RuleKind,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Compiles features into `ResolvedRule` lists.
pub struct RuleCompiler {
    config: CompilerConfig,
}

/// A declared rule after conversion, before id allocation.
struct ConvertedRule {
    rule: ResolvedRule,
    experiment: Option<ExperimentSummary>,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self {
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile one feature for the context's environment.
    ///
    /// `Ok(None)` means the feature is not served there: archived, disabled,
    /// or outside the environment's projects.
    pub fn compile(
        &self,
        feature: &Feature,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<CompiledFeature>, CompileError> {
        let graph = build_graph(
            ctx.features
                .iter()
                .filter(|f| f.id != feature.id)
                .chain(std::iter::once(feature)),
        );
        if let Some(path) = detect_cycle(&graph, &feature.id) {
            return Err(CycleError::Cycle { path }.into());
        }
        Ok(self.compile_acyclic(feature, ctx))
    }

    /// Compile every feature of the snapshot, prerequisites first.
    pub fn compile_environment(&self, ctx: &CompileContext<'_>) -> CompiledEnvironment {
        let resolution = resolve(ctx.features);
        let by_id: BTreeMap<&str, &Feature> =
            ctx.features.iter().map(|f| (f.id.as_str(), f)).collect();

        let mut compiled = CompiledEnvironment {
            environment: ctx.environment.id.clone(),
            ..Default::default()
        };

        for id in &resolution.order {
            let Some(feature) = by_id.get(id.as_str()) else {
                continue;
            };
            let Some(result) = self.compile_acyclic(feature, ctx) else {
                continue;
            };
            compiled.experiments.extend(result.experiments);
            compiled.saved_groups_in_use.extend(result.saved_groups_in_use);
            compiled.warnings.extend(result.warnings);
            compiled.next_scheduled_update =
                earliest(compiled.next_scheduled_update, result.next_scheduled_update);
            compiled.features.insert(result.feature_id, result.definition);
        }

        for (id, path) in &resolution.cyclic {
            compiled.errors.insert(
                id.clone(),
                ConfigurationError::CyclicPrerequisite { path: path.clone() },
            );
        }

        for holdout in ctx.holdouts {
            if !holdout.is_running() || !holdout.is_enabled_in(&ctx.environment.id) {
                continue;
            }
            let (definition, summary) = holdout_feature(holdout, ctx.now);
            compiled.next_scheduled_update =
                earliest(compiled.next_scheduled_update, holdout.next_ramp_change(ctx.now));
            compiled.features.insert(summary.feature_key.clone(), definition);
            compiled.holdouts.insert(holdout.id.clone(), summary);
        }

        info!(
            environment = %ctx.environment.id,
            features = compiled.features.len(),
            warnings = compiled.warnings.len(),
            errors = compiled.errors.len(),
            "Compiled environment"
        );

        compiled
    }

    fn compile_acyclic(&self, feature: &Feature, ctx: &CompileContext<'_>) -> Option<CompiledFeature> {
        let environment = &ctx.environment.id;

        if feature.archived {
            debug!(feature_id = %feature.id, "Skipping archived feature");
            return None;
        }
        if !ctx.environment.allows_project(feature.project.as_ref()) {
            debug!(feature_id = %feature.id, environment = %environment, "Project not allowed in environment");
            return None;
        }

        let settings = effective_settings(
            feature,
            ctx.environment,
            ctx.environments,
            self.config.max_environment_depth,
        );
        if !settings.enabled {
            debug!(feature_id = %feature.id, environment = %environment, "Feature disabled in environment");
            return None;
        }

        let mut result = CompiledFeature {
            feature_id: feature.id.clone(),
            definition: CompiledFeatureDefinition {
                default_value: feature.default_value.clone(),
                rules: Vec::new(),
                project: feature.project.clone(),
            },
            experiments: Vec::new(),
            saved_groups_in_use: Default::default(),
            warnings: Vec::new(),
            next_scheduled_update: None,
        };
        let mut ids = RuleIdAllocator::new();

        // 1. Feature-level prerequisites gate everything
        if !feature.prerequisites.is_empty() {
            let mut gate = ResolvedRule::new(ids.allocate(format!("prereq_{}", feature.id)), RuleAction::Gate);
            gate.parent_conditions = feature
                .prerequisites
                .iter()
                .map(|p| ParentCondition {
                    id: p.feature_id.clone(),
                    condition: p.condition.clone(),
                    gate: true,
                })
                .collect();
            result.definition.rules.push(gate);
        }

        // 2. Holdouts
        for mut rule in holdout_rules(feature, environment, ctx.holdouts) {
            rule.id = rule.id.map(|id| ids.allocate(id));
            result.definition.rules.push(rule);
        }

        // 3. Declared rules
        for rule in &settings.rules {
            if !rule.enabled {
                continue;
            }
            if let Some(schedule) = &rule.schedule {
                result.next_scheduled_update =
                    earliest(result.next_scheduled_update, schedule.next_boundary(ctx.now));
                if !schedule.is_active(ctx.now) {
                    debug!(feature_id = %feature.id, rule_id = %rule.id, "Rule outside its schedule");
                    continue;
                }
            }

            let rule_id = normalize_rule_id(&self.config.rule_id_prefix, &feature.id, rule);
            match self.convert_rule(feature, rule, &rule_id, ctx, &mut result) {
                Ok(Some(converted)) => {
                    let mut resolved = converted.rule;
                    resolved.id = Some(ids.allocate(rule_id));
                    result.definition.rules.push(resolved);
                    result.experiments.extend(converted.experiment);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        feature_id = %feature.id,
                        environment = %environment,
                        rule_id = %rule_id,
                        error = %error,
                        "Dropping malformed rule"
                    );
                    result.warnings.push(CompileWarning {
                        feature_id: feature.id.clone(),
                        environment: environment.clone(),
                        error,
                    });
                }
            }
        }

        Some(result)
    }

    fn convert_rule(
        &self,
        feature: &Feature,
        rule: &Rule,
        rule_id: &str,
        ctx: &CompileContext<'_>,
        result: &mut CompiledFeature,
    ) -> Result<Option<ConvertedRule>, ConfigurationError> {
        let mut clauses = Vec::new();
        if !is_empty_condition(rule.condition.as_ref()) {
            if let Some(condition) = &rule.condition {
                validate(condition).map_err(|e| ConfigurationError::MalformedCondition {
                    rule_id: rule_id.to_string(),
                    reason: e.to_string(),
                })?;
                clauses.push(condition.clone());
            }
        }

        let groups = expand_saved_groups(
            rule_id,
            &rule.saved_groups,
            ctx.saved_groups,
            ctx.inline_saved_groups,
        )?;
        clauses.extend(groups.clauses);

        let mut draft = false;
        let mut experiment = None;
        let action = match &rule.kind {
            RuleKind::Force(force) => RuleAction::Force(ForceAction {
                value: force.value.clone(),
            }),
            RuleKind::Rollout(rollout) => {
                if !(0.0..=1.0).contains(&rollout.coverage) {
                    return Err(ConfigurationError::InvalidCoverage {
                        rule_id: rule_id.to_string(),
                        coverage: rollout.coverage,
                    });
                }
                RuleAction::Rollout(RolloutAction {
                    value: rollout.value.clone(),
                    coverage: rollout.coverage,
                    hash_attribute: rollout.hash_attribute.clone(),
                    seed: rollout.seed.clone().unwrap_or_else(|| feature.id.clone()),
                    hash_version: rollout.hash_version,
                })
            }
            RuleKind::Experiment(exp) => {
                self.check_experiment(exp, rule_id)?;
                match exp.status {
                    ExperimentStatus::Stopped => {
                        let Some(released) = exp.released_variation else {
                            debug!(
                                feature_id = %feature.id,
                                experiment_id = %exp.experiment_id,
                                "Stopped experiment without a released variation"
                            );
                            return Ok(None);
                        };
                        let variation = exp.variations.get(released).ok_or_else(|| {
                            ConfigurationError::InvalidVariations {
                                rule_id: rule_id.to_string(),
                                reason: format!("released variation {} does not exist", released),
                            }
                        })?;
                        RuleAction::Force(ForceAction {
                            value: variation.value.clone(),
                        })
                    }
                    status => {
                        draft = status == ExperimentStatus::Draft;
                        experiment = Some(ExperimentSummary {
                            key: exp.tracking_key.clone(),
                            experiment_id: exp.experiment_id.clone(),
                            feature_id: feature.id.clone(),
                            status,
                            variations: exp.variations.iter().map(|v| v.key.clone()).collect(),
                            hash_attribute: exp.hash_attribute.clone(),
                            project: feature.project.clone(),
                        });
                        RuleAction::Experiment(experiment_action(exp))
                    }
                }
            }
        };

        result.saved_groups_in_use.extend(groups.referenced);

        let mut resolved = ResolvedRule::new(rule_id, action);
        resolved.condition = combine_conditions(clauses);
        resolved.draft = draft;
        resolved.parent_conditions = rule
            .prerequisites
            .iter()
            .map(|p| ParentCondition {
                id: p.feature_id.clone(),
                condition: p.condition.clone(),
                gate: false,
            })
            .collect();

        Ok(Some(ConvertedRule {
            rule: resolved,
            experiment,
        }))
    }

    fn check_experiment(&self, exp: &ExperimentRef, rule_id: &str) -> Result<(), ConfigurationError> {
        if exp.tracking_key.is_empty() {
            return Err(ConfigurationError::InvalidVariations {
                rule_id: rule_id.to_string(),
                reason: "missing tracking key".to_string(),
            });
        }
        bucket_ranges(&exp.weights(), exp.coverage, self.config.weight_tolerance)
            .map(|_| ())
            .map_err(|e| match e {
                BucketingError::InvalidCoverage { coverage } => ConfigurationError::InvalidCoverage {
                    rule_id: rule_id.to_string(),
                    coverage,
                },
                other => ConfigurationError::InvalidVariations {
                    rule_id: rule_id.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn experiment_action(exp: &ExperimentRef) -> ExperimentAction {
    ExperimentAction {
        key: exp.tracking_key.clone(),
        experiment_id: exp.experiment_id.clone(),
        variations: exp.variations.iter().map(|v| v.value.clone()).collect::<Vec<Value>>(),
        weights: exp.weights(),
        meta: exp.variations.iter().map(|v| v.key.clone()).collect(),
        coverage: exp.coverage,
        hash_attribute: exp.hash_attribute.clone(),
        fallback_attribute: exp.fallback_attribute.clone(),
        hash_version: exp.hash_version,
        namespace: exp.namespace.clone(),
        disable_sticky_bucketing: exp.disable_sticky_bucketing,
        bucket_version: exp.bucket_version,
    }
}
