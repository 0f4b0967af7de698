//! Algorithms for the Sample Evaluator

pub mod hash_value;

pub use hash_value::hash_value;
