//! Application layer for the Payload Cache

pub mod cache;
pub mod listener;
pub mod service;

pub use cache::{cache_key, CacheKey, PayloadCache};
pub use listener::InvalidationListener;
pub use service::{PayloadService, PayloadStores};
