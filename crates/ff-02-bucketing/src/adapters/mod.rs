//! Adapters for Bucketing

pub mod memory;

pub use memory::InMemoryStickyBucketStore;
