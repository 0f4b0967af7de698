//! Domain module for the Sample Evaluator

pub mod context;
pub mod errors;
pub mod result;

pub use context::*;
pub use errors::*;
pub use result::*;
