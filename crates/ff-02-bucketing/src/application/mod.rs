//! Application layer for Bucketing

pub mod service;

pub use service::BucketingService;
