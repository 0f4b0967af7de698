//! Cross-subsystem integration tests

pub mod fixtures;

mod concurrency;
mod holdouts;
mod invalidation;
mod prerequisites;
mod properties;
mod scenarios;
mod staleness;
