//! Swap-on-complete payload cache
//!
//! Readers take an `Arc` snapshot under a short read lock and never see a
//! half-written payload. Writers for the same key are serialized by a
//! per-key async mutex; a generation counter per key lets a writer notice
//! that a newer refresh was requested while it waited.

use parking_lot::{Mutex, RwLock};
use shared_types::{EnvironmentId, OrganizationId, SdkPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type CacheKey = (OrganizationId, EnvironmentId);

pub fn cache_key(organization: &str, environment: &str) -> CacheKey {
    (organization.to_string(), environment.to_string())
}

#[derive(Default)]
pub struct PayloadCache {
    entries: RwLock<HashMap<CacheKey, Arc<SdkPayload>>>,
    writers: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    requested: Mutex<HashMap<CacheKey, u64>>,
}

impl PayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SdkPayload>> {
        self.entries.read().get(key).cloned()
    }

    /// Reserve the next generation for `key`.
    pub fn request_generation(&self, key: &CacheKey) -> u64 {
        let mut requested = self.requested.lock();
        let counter = requested.entry(key.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Highest generation requested so far for `key`.
    pub fn latest_requested(&self, key: &CacheKey) -> u64 {
        self.requested.lock().get(key).copied().unwrap_or(0)
    }

    /// The async mutex serializing writers of `key`.
    pub fn writer(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        self.writers
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Install `payload` unless the entry already holds a newer generation.
    pub fn swap(&self, key: CacheKey, payload: Arc<SdkPayload>) -> bool {
        let mut entries = self.entries.write();
        if let Some(current) = entries.get(&key) {
            if current.generation >= payload.generation {
                debug!(
                    organization = %key.0,
                    environment = %key.1,
                    current = current.generation,
                    offered = payload.generation,
                    "Keeping newer cached payload"
                );
                return false;
            }
        }
        entries.insert(key, payload);
        true
    }

    /// Install a payload loaded from persistence if nothing is cached yet.
    pub fn fill(&self, key: CacheKey, payload: Arc<SdkPayload>) -> Arc<SdkPayload> {
        let generation = payload.generation;
        let entry = self.entries.write().entry(key.clone()).or_insert(payload).clone();
        let mut requested = self.requested.lock();
        let counter = requested.entry(key).or_insert(0);
        *counter = (*counter).max(generation);
        entry
    }

    pub fn invalidate(&self, key: &CacheKey) -> Option<Arc<SdkPayload>> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
