//! Application layer for the Rule Compiler

pub mod service;

pub use service::RuleCompiler;
