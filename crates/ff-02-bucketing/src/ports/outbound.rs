//! Outbound Ports (Driven Ports / SPI)

use crate::domain::errors::BucketingError;
use crate::domain::value_objects::StickyAssignmentKey;
use async_trait::async_trait;

/// Persisted variation assignments.
///
/// Values are variation keys, not indices, so reordering variations does
/// not silently move users.
#[async_trait]
pub trait StickyBucketStore: Send + Sync {
    async fn get_assignment(
        &self,
        key: &StickyAssignmentKey,
    ) -> Result<Option<String>, BucketingError>;

    async fn put_assignment(
        &self,
        key: StickyAssignmentKey,
        variation_key: String,
    ) -> Result<(), BucketingError>;
}
