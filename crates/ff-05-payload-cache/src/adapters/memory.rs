//! In-memory adapters
//!
//! Every write bumps the organization's revision, so a compilation that
//! straddles a write sees two different revisions and retries. The feature
//! store owns the counter; the other stores join it with
//! `sharing_revisions`. Stores built with `with_publisher` also announce
//! their writes on the bus.

use crate::domain::errors::PayloadError;
use crate::domain::jobs::RefreshJob;
use crate::ports::outbound::{
    FeatureStore, HoldoutStore, OrganizationStore, PayloadPersistence, RefreshQueue,
    SavedGroupStore,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventPublisher, FlagEvent};
use shared_types::{
    EnvironmentId, Feature, Holdout, Organization, OrganizationId, ProjectId, SavedGroup,
    SdkPayload,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

// =============================================================================
// REVISIONS
// =============================================================================

/// Per-organization write counter shared by every store of one engine.
#[derive(Default)]
pub struct OrganizationRevisions {
    revisions: RwLock<HashMap<OrganizationId, u64>>,
}

impl OrganizationRevisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self, organization: &str) -> u64 {
        let mut revisions = self.revisions.write();
        let revision = revisions.entry(organization.to_string()).or_insert(0);
        *revision += 1;
        *revision
    }

    pub fn current(&self, organization: &str) -> u64 {
        self.revisions.read().get(organization).copied().unwrap_or(0)
    }
}

async fn announce(publisher: &Option<Arc<dyn EventPublisher>>, event: FlagEvent) {
    if let Some(publisher) = publisher {
        publisher.publish(event).await;
    }
}

/// Union of two project scopes, where empty means every project.
fn merge_projects(previous: &[ProjectId], current: &[ProjectId]) -> Vec<ProjectId> {
    if previous.is_empty() || current.is_empty() {
        return Vec::new();
    }
    previous
        .iter()
        .chain(current)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// =============================================================================
// FEATURE STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryFeatureStore {
    features: RwLock<HashMap<OrganizationId, Vec<Feature>>>,
    revisions: Arc<OrganizationRevisions>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::default()
        }
    }

    /// Insert or replace a feature, bumping its revision on replace.
    pub async fn upsert(&self, mut feature: Feature) {
        let organization = feature.organization.clone();
        let (event, revision) = {
            let mut all = self.features.write();
            let list = all.entry(organization.clone()).or_default();
            let environments: Vec<EnvironmentId> = feature.environments.keys().cloned().collect();
            match list.iter_mut().find(|f| f.id == feature.id) {
                Some(existing) => {
                    feature.revision = existing.revision + 1;
                    let previous_project = (existing.project != feature.project)
                        .then(|| existing.project.clone())
                        .flatten();
                    let event = FlagEvent::FeatureUpdated {
                        organization: organization.clone(),
                        feature_id: feature.id.clone(),
                        project: feature.project.clone(),
                        previous_project,
                        environments: merge_envs(&existing.environments, environments),
                        revision: feature.revision,
                    };
                    *existing = feature;
                    (event, self.bump(&organization))
                }
                None => {
                    let event = FlagEvent::FeatureCreated {
                        organization: organization.clone(),
                        feature_id: feature.id.clone(),
                        project: feature.project.clone(),
                        environments,
                    };
                    list.push(feature);
                    (event, self.bump(&organization))
                }
            }
        };
        debug!(organization = %organization, revision, "Feature stored");
        self.announce(event).await;
    }

    pub async fn delete(&self, organization: &str, feature_id: &str) -> Option<Feature> {
        let removed = {
            let mut all = self.features.write();
            let list = all.get_mut(organization)?;
            let index = list.iter().position(|f| f.id == feature_id)?;
            Some(list.remove(index))
        }?;
        self.bump(organization);
        self.announce(FlagEvent::FeatureDeleted {
            organization: organization.to_string(),
            feature_id: removed.id.clone(),
            project: removed.project.clone(),
            environments: removed.environments.keys().cloned().collect(),
        })
        .await;
        Some(removed)
    }

    /// Bump the revision without changing data, as a concurrent writer would.
    pub fn touch(&self, organization: &str) -> u64 {
        self.bump(organization)
    }

    /// The counter the other stores of this engine should share.
    pub fn revisions(&self) -> Arc<OrganizationRevisions> {
        self.revisions.clone()
    }

    fn bump(&self, organization: &str) -> u64 {
        self.revisions.bump(organization)
    }

    async fn announce(&self, event: FlagEvent) {
        announce(&self.publisher, event).await;
    }
}

fn merge_envs(
    existing: &std::collections::BTreeMap<EnvironmentId, shared_types::FeatureEnvironment>,
    mut current: Vec<EnvironmentId>,
) -> Vec<EnvironmentId> {
    for env in existing.keys() {
        if !current.contains(env) {
            current.push(env.clone());
        }
    }
    current.sort();
    current
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn list_features(&self, organization: &str) -> Result<Vec<Feature>, PayloadError> {
        Ok(self
            .features
            .read()
            .get(organization)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_feature(
        &self,
        organization: &str,
        feature_id: &str,
    ) -> Result<Option<Feature>, PayloadError> {
        Ok(self
            .features
            .read()
            .get(organization)
            .and_then(|list| list.iter().find(|f| f.id == feature_id).cloned()))
    }

    async fn revision(&self, organization: &str) -> Result<u64, PayloadError> {
        Ok(self.revisions.current(organization))
    }
}

// =============================================================================
// SAVED GROUPS AND HOLDOUTS
// =============================================================================

#[derive(Default)]
pub struct InMemorySavedGroupStore {
    groups: RwLock<HashMap<OrganizationId, Vec<SavedGroup>>>,
    revisions: Arc<OrganizationRevisions>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl InMemorySavedGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::default()
        }
    }

    pub fn sharing_revisions(mut self, revisions: Arc<OrganizationRevisions>) -> Self {
        self.revisions = revisions;
        self
    }

    /// Insert or replace a group. Projects of the replaced version are
    /// announced too, since its old references may have to disappear.
    pub async fn upsert(&self, organization: &str, group: SavedGroup) {
        let (event, revision) = {
            let mut all = self.groups.write();
            let list = all.entry(organization.to_string()).or_default();
            let projects = match list.iter().position(|g| g.id == group.id) {
                Some(index) => merge_projects(&list.remove(index).projects, &group.projects),
                None => group.projects.clone(),
            };
            let event = FlagEvent::SavedGroupChanged {
                organization: organization.to_string(),
                saved_group_id: group.id.clone(),
                projects,
            };
            list.push(group);
            (event, self.revisions.bump(organization))
        };
        debug!(organization, revision, "Saved group stored");
        announce(&self.publisher, event).await;
    }
}

#[async_trait]
impl SavedGroupStore for InMemorySavedGroupStore {
    async fn list_saved_groups(&self, organization: &str) -> Result<Vec<SavedGroup>, PayloadError> {
        Ok(self
            .groups
            .read()
            .get(organization)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryHoldoutStore {
    holdouts: RwLock<HashMap<OrganizationId, Vec<Holdout>>>,
    revisions: Arc<OrganizationRevisions>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl InMemoryHoldoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::default()
        }
    }

    pub fn sharing_revisions(mut self, revisions: Arc<OrganizationRevisions>) -> Self {
        self.revisions = revisions;
        self
    }

    /// Insert or replace a holdout. The announced scope covers both the old
    /// and the new environments and projects.
    pub async fn upsert(&self, organization: &str, holdout: Holdout) {
        let (event, revision) = {
            let mut all = self.holdouts.write();
            let list = all.entry(organization.to_string()).or_default();
            let mut environments: BTreeSet<EnvironmentId> =
                holdout.environments.keys().cloned().collect();
            let projects = match list.iter().position(|h| h.id == holdout.id) {
                Some(index) => {
                    let previous = list.remove(index);
                    environments.extend(previous.environments.into_keys());
                    merge_projects(&previous.projects, &holdout.projects)
                }
                None => holdout.projects.clone(),
            };
            let event = FlagEvent::HoldoutChanged {
                organization: organization.to_string(),
                holdout_id: holdout.id.clone(),
                projects,
                environments: environments.into_iter().collect(),
            };
            list.push(holdout);
            (event, self.revisions.bump(organization))
        };
        debug!(organization, revision, "Holdout stored");
        announce(&self.publisher, event).await;
    }
}

#[async_trait]
impl HoldoutStore for InMemoryHoldoutStore {
    async fn list_active_holdouts(&self, organization: &str) -> Result<Vec<Holdout>, PayloadError> {
        Ok(self
            .holdouts
            .read()
            .get(organization)
            .map(|list| list.iter().filter(|h| h.is_running()).cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

#[derive(Default)]
pub struct InMemoryOrganizationStore {
    organizations: RwLock<HashMap<OrganizationId, Organization>>,
    revisions: Arc<OrganizationRevisions>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::default()
        }
    }

    pub fn sharing_revisions(mut self, revisions: Arc<OrganizationRevisions>) -> Self {
        self.revisions = revisions;
        self
    }

    /// Insert or replace an organization, announcing every environment and
    /// connection whose settings differ from the stored version.
    pub async fn upsert(&self, organization: Organization) {
        let id = organization.id.clone();
        let (events, revision) = {
            let mut all = self.organizations.write();
            let events = match all.get(&id) {
                Some(previous) => organization_changes(previous, &organization),
                // nothing is cached for an organization nobody has seen
                None => Vec::new(),
            };
            all.insert(id.clone(), organization);
            (events, self.revisions.bump(&id))
        };
        debug!(organization = %id, revision, changes = events.len(), "Organization stored");
        for event in events {
            announce(&self.publisher, event).await;
        }
    }
}

/// Events describing how `current` differs from `previous`. A change to the
/// organization settings touches every environment.
fn organization_changes(previous: &Organization, current: &Organization) -> Vec<FlagEvent> {
    let settings_changed = previous.settings != current.settings;
    let environments = current
        .environments
        .iter()
        .filter(|env| {
            settings_changed || previous.environments.iter().all(|p| p != *env)
        })
        .map(|env| FlagEvent::EnvironmentSettingsChanged {
            organization: current.id.clone(),
            environment: env.id.clone(),
        });
    let connections = current
        .connections
        .iter()
        .filter(|connection| previous.connections.iter().all(|p| p != *connection))
        .map(|connection| FlagEvent::ConnectionChanged {
            organization: current.id.clone(),
            connection_id: connection.id.clone(),
        });
    environments.chain(connections).collect()
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn get_organization(
        &self,
        organization: &str,
    ) -> Result<Option<Organization>, PayloadError> {
        Ok(self.organizations.read().get(organization).cloned())
    }
}

// =============================================================================
// PAYLOAD PERSISTENCE
// =============================================================================

#[derive(Default)]
pub struct InMemoryPayloadPersistence {
    payloads: RwLock<HashMap<(OrganizationId, EnvironmentId), SdkPayload>>,
}

impl InMemoryPayloadPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payloads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.read().is_empty()
    }
}

#[async_trait]
impl PayloadPersistence for InMemoryPayloadPersistence {
    async fn load(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Option<SdkPayload>, PayloadError> {
        Ok(self
            .payloads
            .read()
            .get(&(organization.to_string(), environment.to_string()))
            .cloned())
    }

    async fn save(
        &self,
        organization: &OrganizationId,
        environment: &EnvironmentId,
        payload: &SdkPayload,
    ) -> Result<(), PayloadError> {
        self.payloads
            .write()
            .insert((organization.clone(), environment.clone()), payload.clone());
        Ok(())
    }
}

// =============================================================================
// REFRESH QUEUE
// =============================================================================

/// FIFO queue that folds a new job into a pending job of the same
/// organization instead of queueing it twice.
#[derive(Default)]
pub struct InMemoryRefreshQueue {
    jobs: Mutex<VecDeque<RefreshJob>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryRefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshQueue for InMemoryRefreshQueue {
    async fn enqueue(&self, job: RefreshJob) -> Result<(), PayloadError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PayloadError::QueueClosed);
        }
        {
            let mut jobs = self.jobs.lock();
            match jobs.iter_mut().find(|j| j.organization == job.organization) {
                Some(pending) => {
                    debug!(organization = %job.organization, job_id = %pending.id, "Coalescing refresh job");
                    pending.merge(job);
                }
                None => jobs.push_back(job),
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<RefreshJob> {
        loop {
            let notified = self.notify.notified();
            if let Some(job) = self.jobs.lock().pop_front() {
                return Some(job);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::{EventFilter, InMemoryEventBus};
    use shared_types::{Environment, PayloadKey, ValueType};
    use std::time::Duration;

    fn feature(id: &str) -> Feature {
        Feature::new(id, "org_1", ValueType::Boolean, json!(false))
    }

    #[tokio::test]
    async fn test_feature_store_revisions() {
        let store = InMemoryFeatureStore::new();
        assert_eq!(store.revision("org_1").await.unwrap(), 0);

        store.upsert(feature("a")).await;
        store.upsert(feature("a")).await;
        assert_eq!(store.revision("org_1").await.unwrap(), 2);

        let stored = store.get_feature("org_1", "a").await.unwrap().unwrap();
        assert_eq!(stored.revision, 2);

        assert!(store.delete("org_1", "a").await.is_some());
        assert!(store.delete("org_1", "a").await.is_none());
        assert_eq!(store.revision("org_1").await.unwrap(), 3);
        assert!(store.list_features("org_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feature_store_publishes() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let store = InMemoryFeatureStore::with_publisher(bus.clone());

        store.upsert(feature("a").with_project("p1")).await;
        store.upsert(feature("a").with_project("p2")).await;

        assert!(matches!(sub.try_recv(), Ok(Some(FlagEvent::FeatureCreated { .. }))));
        match sub.try_recv() {
            Ok(Some(FlagEvent::FeatureUpdated { previous_project, .. })) => {
                assert_eq!(previous_project, Some("p1".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_holdout_store_lists_running_only() {
        let store = InMemoryHoldoutStore::new();
        store.upsert("org_1", Holdout::new("h1")).await;
        let mut stopped = Holdout::new("h2");
        stopped.status = shared_types::HoldoutStatus::Stopped;
        store.upsert("org_1", stopped).await;

        let active = store.list_active_holdouts("org_1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "h1");
    }

    #[tokio::test]
    async fn test_stores_share_the_organization_revision() {
        let features = InMemoryFeatureStore::new();
        let groups = InMemorySavedGroupStore::new().sharing_revisions(features.revisions());
        let holdouts = InMemoryHoldoutStore::new().sharing_revisions(features.revisions());
        let organizations =
            InMemoryOrganizationStore::new().sharing_revisions(features.revisions());

        groups
            .upsert("org_1", SavedGroup::list("beta", "id", vec!["u1".into()]))
            .await;
        assert_eq!(features.revision("org_1").await.unwrap(), 1);
        holdouts.upsert("org_1", Holdout::new("h1")).await;
        organizations.upsert(Organization::new("org_1")).await;
        assert_eq!(features.revision("org_1").await.unwrap(), 3);
        assert_eq!(features.revision("org_2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_saved_group_and_holdout_stores_publish() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let groups = InMemorySavedGroupStore::with_publisher(bus.clone());
        let holdouts = InMemoryHoldoutStore::with_publisher(bus.clone());

        let mut group = SavedGroup::list("beta", "id", vec!["u1".into()]);
        group.projects = vec!["p1".into()];
        groups.upsert("org_1", group.clone()).await;
        group.projects = vec!["p2".into()];
        groups.upsert("org_1", group).await;

        holdouts
            .upsert("org_1", Holdout::new("h1").with_environment("production"))
            .await;
        holdouts
            .upsert("org_1", Holdout::new("h1").with_environment("staging"))
            .await;

        match sub.drain().unwrap().as_slice() {
            [FlagEvent::SavedGroupChanged { projects: first, .. }, FlagEvent::SavedGroupChanged { projects: second, .. }, FlagEvent::HoldoutChanged { environments: created, .. }, FlagEvent::HoldoutChanged { environments: moved, .. }] =>
            {
                assert_eq!(first, &vec!["p1".to_string()]);
                assert_eq!(second, &vec!["p1".to_string(), "p2".to_string()]);
                assert_eq!(created, &vec!["production".to_string()]);
                assert_eq!(moved, &vec!["production".to_string(), "staging".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_organization_store_publishes_changed_settings() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let store = InMemoryOrganizationStore::with_publisher(bus.clone());
        let org = Organization::new("org_1")
            .with_environment(Environment::new("production"))
            .with_environment(Environment::new("staging"));

        store.upsert(org.clone()).await;
        store.upsert(org.clone()).await;
        assert!(sub.drain().unwrap().is_empty());

        let mut edited = org.clone();
        edited.environments[1].default_state = false;
        store.upsert(edited.clone()).await;
        match sub.drain().unwrap().as_slice() {
            [FlagEvent::EnvironmentSettingsChanged { environment, .. }] => {
                assert_eq!(environment, "staging");
            }
            other => panic!("unexpected {:?}", other),
        }

        edited.settings.secure_attribute_salt = "pepper".into();
        store.upsert(edited).await;
        assert_eq!(sub.drain().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_queue_coalesces_per_organization() {
        let queue = InMemoryRefreshQueue::new();
        let key = |env: &str| -> BTreeSet<PayloadKey> { [PayloadKey::new(env, None)].into() };

        queue.enqueue(RefreshJob::new("org_1", key("production"), BTreeSet::new())).await.unwrap();
        queue.enqueue(RefreshJob::new("org_1", key("staging"), BTreeSet::new())).await.unwrap();
        queue.enqueue(RefreshJob::new("org_2", key("production"), BTreeSet::new())).await.unwrap();
        assert_eq!(queue.pending(), 2);

        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.organization, "org_1");
        assert_eq!(first.payload_keys.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_wakes_waiter_and_closes() {
        let queue = Arc::new(InMemoryRefreshQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue
            .enqueue(RefreshJob::new("org_1", [PayloadKey::new("production", None)].into(), BTreeSet::new()))
            .await
            .unwrap();
        let job = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(job.is_some());

        queue.close();
        assert!(queue.dequeue().await.is_none());
        assert_eq!(
            queue
                .enqueue(RefreshJob::new("org_1", BTreeSet::new(), BTreeSet::new()))
                .await,
            Err(PayloadError::QueueClosed)
        );
    }
}
