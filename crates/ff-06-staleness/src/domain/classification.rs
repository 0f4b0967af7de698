//! Classification results

use serde::{Deserialize, Serialize};
use shared_types::{EnvironmentId, FeatureId};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal state of the priority chain, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    NeverStale,
    RecentlyUpdated,
    ActiveDraft,
    HasDependents,
    NoRules,
    RulesOneSided,
    AbandonedDraft,
    ToggledOff,
    ActiveExperiment,
    HasRules,
    Error,
}

impl StaleReason {
    pub fn is_stale(self) -> bool {
        matches!(
            self,
            Self::NoRules | Self::RulesOneSided | Self::AbandonedDraft | Self::ToggledOff
        )
    }

    /// Reasons decided by the feature alone, identical in every environment.
    pub fn is_feature_level(self) -> bool {
        matches!(
            self,
            Self::NeverStale | Self::RecentlyUpdated | Self::ActiveDraft | Self::HasDependents
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverStale => "never-stale",
            Self::RecentlyUpdated => "recently-updated",
            Self::ActiveDraft => "active-draft",
            Self::HasDependents => "has-dependents",
            Self::NoRules => "no-rules",
            Self::RulesOneSided => "rules-one-sided",
            Self::AbandonedDraft => "abandoned-draft",
            Self::ToggledOff => "toggled-off",
            Self::ActiveExperiment => "active-experiment",
            Self::HasRules => "has-rules",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStaleness {
    pub stale: bool,
    pub reason: StaleReason,
    /// Set when `reason` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnvironmentStaleness {
    pub fn from_reason(reason: StaleReason) -> Self {
        Self {
            stale: reason.is_stale(),
            reason,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            stale: false,
            reason: StaleReason::Error,
            error: Some(message.into()),
        }
    }
}

/// `{overall, perEnvironment}` for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessReport {
    pub feature_id: FeatureId,
    pub stale: bool,
    pub reason: StaleReason,
    pub per_environment: BTreeMap<EnvironmentId, EnvironmentStaleness>,
}

impl StalenessReport {
    /// Fold per-environment results into the overall verdict.
    ///
    /// The feature is stale only when every environment is. The overall
    /// reason is the first stale reason when stale, otherwise the first
    /// reason that kept an environment fresh.
    pub fn summarize(
        feature_id: impl Into<FeatureId>,
        per_environment: BTreeMap<EnvironmentId, EnvironmentStaleness>,
    ) -> Self {
        let stale = !per_environment.is_empty() && per_environment.values().all(|e| e.stale);
        let reason = per_environment
            .values()
            .find(|e| e.stale == stale)
            .map(|e| e.reason)
            .unwrap_or(StaleReason::NoRules);
        Self {
            feature_id: feature_id.into(),
            stale,
            reason,
            per_environment,
        }
    }

    pub fn environment(&self, id: &str) -> Option<&EnvironmentStaleness> {
        self.per_environment.get(id)
    }
}
