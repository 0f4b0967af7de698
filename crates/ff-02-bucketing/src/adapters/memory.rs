//! In-memory sticky bucket store

use crate::domain::errors::BucketingError;
use crate::domain::value_objects::StickyAssignmentKey;
use crate::ports::outbound::StickyBucketStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryStickyBucketStore {
    assignments: RwLock<HashMap<StickyAssignmentKey, String>>,
}

impl InMemoryStickyBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.read().is_empty()
    }
}

#[async_trait]
impl StickyBucketStore for InMemoryStickyBucketStore {
    async fn get_assignment(
        &self,
        key: &StickyAssignmentKey,
    ) -> Result<Option<String>, BucketingError> {
        Ok(self.assignments.read().get(key).cloned())
    }

    async fn put_assignment(
        &self,
        key: StickyAssignmentKey,
        variation_key: String,
    ) -> Result<(), BucketingError> {
        debug!(
            attribute_key = %key.attribute_key,
            tracking_key = %key.tracking_key,
            variation = %variation_key,
            "Persisting sticky assignment"
        );
        self.assignments.write().insert(key, variation_key);
        Ok(())
    }
}
