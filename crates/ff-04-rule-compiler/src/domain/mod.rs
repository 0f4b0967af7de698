//! Domain module for the Rule Compiler

pub mod compiled;
pub mod context;
pub mod errors;
