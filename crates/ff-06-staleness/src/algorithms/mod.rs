//! Algorithms for the Staleness Classifier

pub mod one_sided;

pub use one_sided::{is_one_sided, reachable_values, serves_traffic};
