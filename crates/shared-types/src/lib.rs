//! # Shared Types Crate
//!
//! This crate contains the feature-flag data model, the compiled payload
//! types and the error taxonomy shared by every subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Ids, not references**: Features, saved groups and holdouts refer to
//!   each other by id only. Graphs are built per compilation pass.
//! - **Closed rule variants**: `RuleKind` and `RuleAction` are sum types,
//!   matched exhaustively by the compiler and the evaluator.

pub mod entities;
pub mod errors;
pub mod payload;

pub use entities::*;
pub use errors::*;
pub use payload::*;
