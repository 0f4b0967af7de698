//! Ports module for the Sample Evaluator

pub mod inbound;

pub use inbound::SampleEvaluatorApi;
