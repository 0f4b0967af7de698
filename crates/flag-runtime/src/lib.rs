//! # Flag Runtime
//!
//! The library facade of the Flagforge engine.
//!
//! ## Architecture
//!
//! - `container/` - Engine configuration and the wired [`FlagEngine`]
//! - `worker` - Background refresh worker draining the refresh queue
//! - `errors` - [`EngineError`], the facade's error type
//!
//! ## Operations
//!
//! | Operation | Consumer |
//! |-----------|----------|
//! | [`FlagEngine::compile_feature_definitions`] | Payload delivery |
//! | [`FlagEngine::evaluate_for_sample`] | Debugging UI |
//! | [`FlagEngine::classify_staleness`] | UI badges and automation |
//! | [`FlagEngine::evaluate_remote`] | Remote-evaluation connections |
//! | [`FlagEngine::check_update`] | Feature editing |
//!
//! ## Startup
//!
//! 1. Build [`EngineConfig::from_env`]
//! 2. Install telemetry with `flag_telemetry::init_telemetry`
//! 3. [`FlagEngine::new`] wires the stores and services
//! 4. [`FlagEngine::start`] spawns the invalidation listener and refresh worker

pub mod container;
pub mod errors;
pub mod worker;

pub use container::{ConfigError, EngineConfig, EngineWorkers, Fixture, FlagEngine};
pub use errors::EngineError;
pub use worker::RefreshWorker;
