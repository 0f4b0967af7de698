//! # FF-04: Rule Compiler
//!
//! Turns a feature's declared per-environment rules into the ordered
//! `ResolvedRule` list that SDKs and the sample evaluator consume.
//!
//! ## Rule order
//!
//! 1. A gate rule for feature-level prerequisites
//! 2. One `Force` rule per holdout wrapping the feature, keyed on the
//!    holdout's `$holdout:<id>` pseudo-feature
//! 3. The declared rules, in author order, with rule-level prerequisites
//!    and saved-group targeting folded in
//!
//! A malformed rule is dropped with a `CompileWarning`; a prerequisite cycle
//! excludes the feature alone.

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;

pub use algorithms::saved_groups::inline_group_references;
pub use application::service::RuleCompiler;
pub use config::CompilerConfig;
pub use domain::compiled::{CompileWarning, CompiledEnvironment, CompiledFeature};
pub use domain::context::CompileContext;
pub use domain::errors::CompileError;
