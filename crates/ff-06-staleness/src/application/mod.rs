//! Application layer for the Staleness Classifier

pub mod service;

pub use service::{StalenessClassifier, StalenessContext};
