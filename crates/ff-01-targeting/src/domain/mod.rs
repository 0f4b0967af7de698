//! Domain module for Targeting
//!
//! Contains the operator catalogue and validation errors.

pub mod errors;
pub mod operators;

pub use errors::*;
pub use operators::*;
