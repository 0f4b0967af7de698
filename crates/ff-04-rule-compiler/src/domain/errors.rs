//! Error types for the Rule Compiler

use ff_03_prerequisites::CycleError;
use shared_types::ConfigurationError;
use thiserror::Error;

/// Errors that abort compilation of a single feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

impl From<CompileError> for ConfigurationError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Cycle(cycle) => cycle.into(),
        }
    }
}
