//! Error types for Bucketing

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketingError {
    /// Weights must be non-negative and sum to 1
    #[error("Variation weights sum to {sum}, expected 1.0")]
    InvalidWeights { sum: f64 },

    #[error("Coverage {coverage} is outside [0, 1]")]
    InvalidCoverage { coverage: f64 },

    /// The experiment declares no variations
    #[error("Experiment has no variations")]
    NoVariations,

    /// Sticky bucket store failure
    #[error("Sticky bucket store error: {0}")]
    Store(String),
}
