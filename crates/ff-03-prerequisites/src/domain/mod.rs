//! Domain module for Prerequisites

pub mod errors;
pub mod graph;

pub use errors::*;
pub use graph::*;
