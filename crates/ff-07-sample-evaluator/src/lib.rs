//! # FF-07: Sample Evaluator
//!
//! Evaluates compiled features for a sample attribute set and explains the
//! result: which rules were checked, which matched and why the others did
//! not.
//!
//! ## Architecture
//!
//! - **Domain**: `EvaluationContext`, `EvaluationResult` with its trace
//! - **Algorithms**: hash attribute lookup with fallback
//! - **Ports**: `SampleEvaluatorApi`
//! - **Application**: `SampleEvaluator`, driving the targeting evaluator and
//!   the bucketing engine over a compiled rule list
//!
//! Evaluation is a read-only simulation: sticky assignments are consulted
//! but never persisted. The same evaluator serves remote evaluation.

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use algorithms::hash_value;
pub use application::SampleEvaluator;
pub use config::EvaluatorConfig;
pub use domain::*;
pub use ports::SampleEvaluatorApi;
