//! # FF-06: Staleness Classifier
//!
//! Flags features that likely no longer need active management.
//!
//! ## Architecture
//!
//! - **Domain**: `StaleReason` (the chain's terminal states), reports
//! - **Algorithms**: the "one-sided" rule heuristic
//! - **Ports**: `StalenessApi`
//! - **Application**: `StalenessClassifier`, a priority chain evaluated per
//!   environment
//!
//! Classification never fails as a whole: an environment that cannot be
//! classified reports `error` and the others are unaffected.

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use algorithms::{is_one_sided, reachable_values, serves_traffic};
pub use application::{StalenessClassifier, StalenessContext};
pub use config::StalenessConfig;
pub use domain::*;
pub use ports::StalenessApi;
