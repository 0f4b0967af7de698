//! Application layer for the Sample Evaluator

pub mod service;

pub use service::SampleEvaluator;
