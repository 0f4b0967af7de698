//! Bucketing algorithms
//!
//! - FNV-1a hashing in two versions
//! - Bucket ranges over `[0, coverage)`
//! - Namespace membership

pub mod hashing;
pub mod namespace;
pub mod ranges;

pub use hashing::{fnv1a32, hash_fraction, hash_seed};
pub use namespace::in_namespace;
pub use ranges::{bucket_ranges, choose_variation, choose_variation_in_ranges};
