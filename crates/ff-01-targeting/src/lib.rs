//! # FF-01: Targeting Condition Evaluator
//!
//! Evaluates MongoDB-style targeting expressions against a user attribute map.
//!
//! ## Architecture
//!
//! - **Domain**: Operator catalogue and validation errors
//! - **Evaluator**: Pure `evaluate(condition, attributes) -> bool`
//! - **Validate**: Structural pre-check used by the Rule Compiler
//! - **Patterns**: Process-wide cache of compiled `$regex` patterns
//! - **Version**: Padded semantic-version comparison for `$v*` operators
//!
//! Unknown or malformed operators evaluate to `false` and are reported as
//! `EvaluationWarning`s, so one bad rule never blocks the rest of a rule list.
//! Every function here is side-effect free apart from logging.

pub mod domain;
pub mod evaluator;
pub mod patterns;
pub mod validate;
pub mod version;

pub use domain::errors::ConditionError;
pub use domain::operators::Operator;
pub use evaluator::{
    evaluate, evaluate_traced, evaluate_value_traced, evaluate_with_groups, get_path, Evaluation,
    SavedGroupValues,
};
pub use validate::validate;
pub use version::padded_version;
