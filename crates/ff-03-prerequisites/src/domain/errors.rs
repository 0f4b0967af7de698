//! Error types for Prerequisites

use shared_types::{ConfigurationError, FeatureId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// The path starts and ends on the same feature
    #[error("Cyclic prerequisite: {}", .path.join(" → "))]
    Cycle { path: Vec<FeatureId> },
}

impl CycleError {
    pub fn path(&self) -> &[FeatureId] {
        match self {
            Self::Cycle { path } => path,
        }
    }
}

impl From<CycleError> for ConfigurationError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::Cycle { path } => ConfigurationError::CyclicPrerequisite { path },
        }
    }
}
