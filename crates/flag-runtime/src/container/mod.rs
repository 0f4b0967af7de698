//! # Engine Container
//!
//! Configuration and the wired engine.

pub mod config;
pub mod engine;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineWorkers, Fixture, FlagEngine};
