//! # Engine Configuration
//!
//! Unified configuration for every subsystem, with environment overrides.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `FF_STALE_RECENT_DAYS` | `staleness.recently_updated_days` |
//! | `FF_STALE_DRAFT_DAYS` | `staleness.abandoned_draft_days` |
//! | `FF_PAYLOAD_SCHEMA_VERSION` | `payload.schema_version` |
//! | `FF_REFRESH_RETRIES` | `payload.consistency_retries` |
//! | `FF_STICKY_BUCKETING` | `bucketing.sticky_bucketing_enabled` |

use std::env;
use std::str::FromStr;

use ff_02_bucketing::BucketingConfig;
use ff_05_payload_cache::PayloadConfig;
use ff_06_staleness::StalenessConfig;
use ff_07_sample_evaluator::EvaluatorConfig;
use flag_telemetry::{parse_flag, TelemetryConfig};
use thiserror::Error;
use tracing::warn;

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
    /// Bucketing and sticky assignment.
    pub bucketing: BucketingConfig,
    /// Payload compilation, including the rule compiler.
    pub payload: PayloadConfig,
    /// Staleness thresholds.
    pub staleness: StalenessConfig,
    /// Sample evaluation limits.
    pub evaluator: EvaluatorConfig,
}

impl EngineConfig {
    /// Defaults with the process environment applied on top.
    pub fn from_env() -> Self {
        let mut config = Self {
            telemetry: TelemetryConfig::from_env(),
            ..Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Apply `FF_*` overrides read through `lookup`.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(days) = parsed(&lookup, "FF_STALE_RECENT_DAYS") {
            self.staleness.recently_updated_days = days;
        }
        if let Some(days) = parsed(&lookup, "FF_STALE_DRAFT_DAYS") {
            self.staleness.abandoned_draft_days = days;
        }
        if let Some(version) = parsed(&lookup, "FF_PAYLOAD_SCHEMA_VERSION") {
            self.payload.schema_version = version;
        }
        if let Some(retries) = parsed(&lookup, "FF_REFRESH_RETRIES") {
            self.payload.consistency_retries = retries;
        }
        if let Some(value) = lookup("FF_STICKY_BUCKETING") {
            self.bucketing.sticky_bucketing_enabled =
                parse_flag(&value, self.bucketing.sticky_bucketing_enabled);
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload.schema_version == 0 {
            return Err(ConfigError::InvalidSchemaVersion);
        }
        if self.staleness.recently_updated_days < 0 || self.staleness.abandoned_draft_days < 0 {
            return Err(ConfigError::NegativeThreshold);
        }
        if !(0.0..0.5).contains(&self.bucketing.weight_tolerance) {
            return Err(ConfigError::WeightTolerance {
                tolerance: self.bucketing.weight_tolerance,
            });
        }
        if self.evaluator.max_parent_depth == 0 {
            return Err(ConfigError::ZeroParentDepth);
        }
        Ok(())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unparsable override");
            None
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Payload schema version must be at least 1")]
    InvalidSchemaVersion,

    #[error("Staleness thresholds must not be negative")]
    NegativeThreshold,

    #[error("Weight tolerance {tolerance} is outside [0, 0.5)")]
    WeightTolerance { tolerance: f64 },

    #[error("Parent condition depth must be at least 1")]
    ZeroParentDepth,
}
