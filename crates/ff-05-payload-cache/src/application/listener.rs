//! Change listener
//!
//! Turns store change notifications into scoped refresh jobs.

use crate::algorithms::invalidation::{affected_connections, payload_keys_for};
use crate::domain::errors::PayloadError;
use crate::domain::jobs::RefreshJob;
use crate::ports::outbound::{OrganizationStore, RefreshQueue};
use shared_bus::{FlagEvent, Subscription};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct InvalidationListener {
    organizations: Arc<dyn OrganizationStore>,
    queue: Arc<dyn RefreshQueue>,
}

impl InvalidationListener {
    pub fn new(organizations: Arc<dyn OrganizationStore>, queue: Arc<dyn RefreshQueue>) -> Self {
        Self {
            organizations,
            queue,
        }
    }

    /// Enqueue the refresh `event` calls for, if any.
    pub async fn handle(&self, event: &FlagEvent) -> Result<Option<RefreshJob>, PayloadError> {
        if !event.invalidates_payloads() {
            return Ok(None);
        }

        let Some(organization) = self.organizations.get_organization(event.organization()).await?
        else {
            warn!(organization = %event.organization(), "Change for unknown organization");
            return Ok(None);
        };

        let keys = payload_keys_for(event, &organization);
        if keys.is_empty() {
            debug!(topic = ?event.topic(), "Change affects no payload");
            return Ok(None);
        }
        let connections = affected_connections(&organization, &keys);

        let job = RefreshJob::new(organization.id.clone(), keys, connections);
        info!(
            job_id = %job.id,
            organization = %job.organization,
            keys = job.payload_keys.len(),
            connections = job.affected_connections.len(),
            "Refresh job queued"
        );
        self.queue.enqueue(job.clone()).await?;
        Ok(Some(job))
    }

    /// Consume `subscription` until the bus closes.
    pub fn spawn(self: Arc<Self>, mut subscription: Subscription) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let Err(e) = self.handle(&event).await {
                    warn!(error = %e, "Failed to queue refresh");
                    if matches!(e, PayloadError::QueueClosed) {
                        break;
                    }
                }
            }
            debug!("Invalidation listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryOrganizationStore, InMemoryRefreshQueue};
    use shared_bus::{EventFilter, InMemoryEventBus, EventPublisher};
    use shared_types::{Environment, Organization, PayloadKey};

    async fn listener() -> (Arc<InvalidationListener>, Arc<InMemoryRefreshQueue>) {
        let organizations = InMemoryOrganizationStore::new();
        organizations
            .upsert(
                Organization::new("org_1")
                    .with_environment(Environment::new("production"))
                    .with_environment(Environment::new("staging")),
            )
            .await;
        let queue = Arc::new(InMemoryRefreshQueue::new());
        (
            Arc::new(InvalidationListener::new(Arc::new(organizations), queue.clone())),
            queue,
        )
    }

    fn created(environments: Vec<String>) -> FlagEvent {
        FlagEvent::FeatureCreated {
            organization: "org_1".into(),
            feature_id: "f".into(),
            project: None,
            environments,
        }
    }

    #[tokio::test]
    async fn test_handle_enqueues_scoped_job() {
        let (listener, queue) = listener().await;

        let job = listener
            .handle(&created(vec!["staging".into()]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            job.payload_keys.into_iter().collect::<Vec<_>>(),
            vec![PayloadKey::new("staging", None)]
        );
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_ignores_commits_and_unknown_organizations() {
        let (listener, queue) = listener().await;

        let refreshed = FlagEvent::PayloadRefreshed {
            organization: "org_1".into(),
            environment: "production".into(),
            generation: 3,
        };
        assert!(listener.handle(&refreshed).await.unwrap().is_none());

        let foreign = FlagEvent::EnvironmentSettingsChanged {
            organization: "org_9".into(),
            environment: "production".into(),
        };
        assert!(listener.handle(&foreign).await.unwrap().is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_spawned_listener_consumes_bus() {
        let (listener, queue) = listener().await;
        let bus = InMemoryEventBus::new();
        let handle = listener.spawn(bus.subscribe(EventFilter::invalidations()));

        bus.publish(created(vec![])).await;
        let job = tokio::time::timeout(std::time::Duration::from_secs(1), queue.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.environments().len(), 2);

        drop(bus);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
