//! # FF-05: Payload Compiler & Cache
//!
//! Compiles every feature of an environment into an SDK payload and keeps
//! one committed payload per (organization, environment).
//!
//! ## Architecture
//!
//! - **Domain**: `OrgSnapshot`, `RefreshJob`, `PayloadError`
//! - **Algorithms**: change-to-key mapping, per-connection projection,
//!   secure attribute hashing
//! - **Ports**: stores, persistence and the refresh queue
//! - **Adapters**: in-memory implementations of every outbound port
//! - **Application**: `PayloadService` (swap-on-complete cache) and
//!   `InvalidationListener`
//!
//! ## Consistency
//!
//! A refresh reads the stores at one revision, compiles, persists the
//! result as not yet deployed, flips it to deployed and swaps it in. A
//! refresh that finds a newer one already requested for the same key
//! steps aside.

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use algorithms::{
    affected_connections, hash_secure_attributes, payload_keys_for, project_contents,
    ProjectionOptions,
};
pub use application::{cache_key, InvalidationListener, PayloadCache, PayloadService, PayloadStores};
pub use config::PayloadConfig;
pub use domain::*;
pub use ports::*;
