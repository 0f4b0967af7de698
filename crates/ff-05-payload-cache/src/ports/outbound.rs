//! Outbound Ports (Driven Ports / SPI)
//!
//! The stores the compiler reads from, the persistence layer payloads are
//! written through to, and the queue refresh jobs travel on.

use crate::domain::errors::PayloadError;
use crate::domain::jobs::RefreshJob;
use async_trait::async_trait;
use shared_types::{
    EnvironmentId, Feature, Holdout, Organization, OrganizationId, SavedGroup,
    SdkPayload,
};

/// Source of truth for features.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn list_features(&self, organization: &str) -> Result<Vec<Feature>, PayloadError>;

    async fn get_feature(
        &self,
        organization: &str,
        feature_id: &str,
    ) -> Result<Option<Feature>, PayloadError>;

    /// Monotonic revision of the organization's flag configuration.
    ///
    /// Read before and after a snapshot to detect a torn read.
    async fn revision(&self, organization: &str) -> Result<u64, PayloadError>;
}

#[async_trait]
pub trait SavedGroupStore: Send + Sync {
    async fn list_saved_groups(&self, organization: &str) -> Result<Vec<SavedGroup>, PayloadError>;
}

#[async_trait]
pub trait HoldoutStore: Send + Sync {
    /// Running holdouts only.
    async fn list_active_holdouts(&self, organization: &str) -> Result<Vec<Holdout>, PayloadError>;
}

/// Environments, connections and settings of an organization.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn get_organization(
        &self,
        organization: &str,
    ) -> Result<Option<Organization>, PayloadError>;
}

#[async_trait]
pub trait PayloadPersistence: Send + Sync {
    async fn load(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Option<SdkPayload>, PayloadError>;

    async fn save(
        &self,
        organization: &OrganizationId,
        environment: &EnvironmentId,
        payload: &SdkPayload,
    ) -> Result<(), PayloadError>;
}

/// Accepts refresh jobs; implementations may coalesce jobs per organization.
#[async_trait]
pub trait RefreshQueue: Send + Sync {
    async fn enqueue(&self, job: RefreshJob) -> Result<(), PayloadError>;

    /// Wait for the next job. `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<RefreshJob>;

    fn pending(&self) -> usize;

    fn close(&self);
}
