//! Compilation results

use chrono::{DateTime, Utc};
use shared_types::{
    CompiledFeatureDefinition, ConfigurationError, EnvironmentId, ExperimentSummary, FeatureId,
    HoldoutId, HoldoutSummary, SavedGroupId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A rule dropped during compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileWarning {
    pub feature_id: FeatureId,
    pub environment: EnvironmentId,
    pub error: ConfigurationError,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.feature_id, self.environment, self.error)
    }
}

/// One feature compiled for one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFeature {
    pub feature_id: FeatureId,
    pub definition: CompiledFeatureDefinition,
    pub experiments: Vec<ExperimentSummary>,
    /// List groups still referenced symbolically through `$inGroup`
    pub saved_groups_in_use: BTreeSet<SavedGroupId>,
    pub warnings: Vec<CompileWarning>,
    /// Earliest schedule boundary after the compilation instant
    pub next_scheduled_update: Option<DateTime<Utc>>,
}

/// Every feature of an organization compiled for one environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledEnvironment {
    pub environment: EnvironmentId,
    pub features: BTreeMap<FeatureId, CompiledFeatureDefinition>,
    pub experiments: Vec<ExperimentSummary>,
    pub saved_groups_in_use: BTreeSet<SavedGroupId>,
    pub holdouts: BTreeMap<HoldoutId, HoldoutSummary>,
    pub warnings: Vec<CompileWarning>,
    /// Features excluded by a terminal configuration error
    pub errors: BTreeMap<FeatureId, ConfigurationError>,
    pub next_scheduled_update: Option<DateTime<Utc>>,
}

/// Earlier of two optional instants.
pub fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
