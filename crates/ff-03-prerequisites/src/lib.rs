//! # FF-03: Prerequisite Graph Resolver
//!
//! Builds the directed graph of feature-to-feature prerequisite references,
//! finds cycles and orders features so every prerequisite is compiled before
//! the features that depend on it.
//!
//! ## Architecture
//!
//! - **Domain**: `PrerequisiteGraph` (adjacency keyed by feature id), `CycleError`
//! - **Algorithms**: DFS cycle detection, Kahn's topological sort
//! - **Resolution**: one-shot `resolve` used by the Rule Compiler
//!
//! The graph stores ids only and is rebuilt from a snapshot on every pass.

pub mod algorithms;
pub mod domain;
pub mod resolution;

pub use algorithms::{detect_cycle, topo_order};
pub use domain::errors::CycleError;
pub use domain::graph::{build_graph, PrerequisiteGraph};
pub use resolution::{check_update, dependents_of, resolve, Resolution};
