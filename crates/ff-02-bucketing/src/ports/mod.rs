//! Ports module for Bucketing

pub mod outbound;

pub use outbound::StickyBucketStore;
