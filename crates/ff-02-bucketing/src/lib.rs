//! # FF-02: Deterministic Bucketing Engine
//!
//! Maps a hash attribute value onto a stable fraction in `[0, 1)` and from
//! there onto coverage and variation buckets.
//!
//! ## Architecture
//!
//! - **Algorithms**: FNV-1a hashing (v1 and v2), bucket ranges, namespaces
//! - **Ports**: `StickyBucketStore` for persisted assignments
//! - **Adapters**: In-memory sticky store
//! - **Application**: `BucketingService::assign` combining all of the above
//!
//! Hash versions are never upgraded here: a rule hashed with v1 keeps
//! hashing with v1 until its author changes it.

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryStickyBucketStore;
pub use algorithms::{
    bucket_ranges, choose_variation, choose_variation_in_ranges, fnv1a32, hash_fraction,
    hash_seed, in_namespace,
};
pub use application::service::BucketingService;
pub use config::BucketingConfig;
pub use domain::errors::BucketingError;
pub use domain::value_objects::*;
pub use ports::outbound::StickyBucketStore;
