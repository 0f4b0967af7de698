//! Graph algorithms
//!
//! - DFS with an explicit recursion stack for cycle paths
//! - Kahn's topological sort with sorted queues for deterministic output

pub mod dfs;
pub mod kahns;

pub use dfs::detect_cycle;
pub use kahns::topo_order;
