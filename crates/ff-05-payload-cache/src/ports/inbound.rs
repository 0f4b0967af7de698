//! Inbound Ports (Driving Ports)

use crate::domain::errors::PayloadError;
use crate::domain::jobs::{RefreshJob, RefreshOutcome};
use async_trait::async_trait;
use shared_types::{
    ConnectionCapabilities, ConnectionId, PayloadContents, PayloadKey, ProjectId, SdkPayload,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Primary Payload Cache API (Driving Port)
#[async_trait]
pub trait PayloadCacheApi: Send + Sync {
    /// Compile a payload for `environment` restricted to `project_filter`
    /// (empty = all projects). Does not touch the cache.
    async fn compile_payload(
        &self,
        organization: &str,
        environment: &str,
        project_filter: &[ProjectId],
    ) -> Result<SdkPayload, PayloadError>;

    /// The cached payload, falling back to the persistence layer. `None`
    /// is a miss.
    async fn get(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Option<Arc<SdkPayload>>, PayloadError>;

    /// Recompile the environments named by `payload_keys` and swap the
    /// results into the cache.
    async fn refresh(
        &self,
        organization: &str,
        payload_keys: &BTreeSet<PayloadKey>,
        affected_connections: &BTreeSet<ConnectionId>,
    ) -> Result<Vec<RefreshOutcome>, PayloadError>;

    /// Run a queued job.
    async fn run_job(&self, job: &RefreshJob) -> Result<Vec<RefreshOutcome>, PayloadError> {
        self.refresh(&job.organization, &job.payload_keys, &job.affected_connections)
            .await
    }

    /// `{features, experiments, savedGroupsInUse, holdouts}` as a client
    /// with `capabilities` should see them.
    async fn compile_feature_definitions(
        &self,
        organization: &str,
        environment: &str,
        project_filter: &[ProjectId],
        capabilities: &ConnectionCapabilities,
    ) -> Result<PayloadContents, PayloadError>;

    /// Delivery contents for a configured SDK connection, encrypted and
    /// hashed according to its capabilities.
    async fn payload_for_connection(
        &self,
        organization: &str,
        connection_id: &str,
    ) -> Result<PayloadContents, PayloadError>;
}
