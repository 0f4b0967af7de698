//! # Flag Engine
//!
//! Holds the stores, the event bus and every subsystem service, and exposes
//! the operations callers use.
//!
//! ## Wiring
//!
//! ```text
//! Stores ──FlagEvent──→ Event Bus ──→ InvalidationListener
//!                                                  │ RefreshJob
//!                                                  ▼
//!                                           RefreshQueue ──→ RefreshWorker
//!                                                                 │
//!                                                                 ▼
//!                                                     PayloadService (cache)
//! ```
//!
//! Sample evaluation and staleness classification read one consistent
//! snapshot of the stores per call and never touch the cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use ff_02_bucketing::{BucketingService, InMemoryStickyBucketStore};
use ff_03_prerequisites::check_update;
use ff_05_payload_cache::{
    InMemoryFeatureStore, InMemoryHoldoutStore, InMemoryOrganizationStore,
    InMemoryPayloadPersistence, InMemoryRefreshQueue, InMemorySavedGroupStore,
    InvalidationListener, OrganizationStore, PayloadCacheApi, PayloadError, PayloadService,
    PayloadStores, RefreshOutcome, RefreshQueue,
};
use ff_06_staleness::{StalenessApi, StalenessClassifier, StalenessContext, StalenessReport};
use ff_07_sample_evaluator::{
    EvaluationContext, EvaluationResult, SampleEvaluator, SampleEvaluatorApi,
};
use serde::{Deserialize, Serialize};
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus};
use shared_types::{
    Attributes, ConnectionCapabilities, Feature, FeatureId, Holdout, Organization,
    PayloadContents, ProjectId, SavedGroup, SdkPayload,
};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::container::config::EngineConfig;
use crate::errors::EngineError;
use crate::worker::RefreshWorker;

/// An organization and its flag configuration, as loaded by
/// [`FlagEngine::load_fixture`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub organization: Organization,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub saved_groups: Vec<SavedGroup>,
    #[serde(default)]
    pub holdouts: Vec<Holdout>,
}

/// Background tasks started by [`FlagEngine::start`].
pub struct EngineWorkers {
    listener: JoinHandle<()>,
    worker: JoinHandle<usize>,
}

pub struct FlagEngine {
    config: EngineConfig,

    // =========================================================================
    // STORES
    // =========================================================================
    event_bus: Arc<InMemoryEventBus>,
    features: Arc<InMemoryFeatureStore>,
    saved_groups: Arc<InMemorySavedGroupStore>,
    holdouts: Arc<InMemoryHoldoutStore>,
    organizations: Arc<InMemoryOrganizationStore>,
    persistence: Arc<InMemoryPayloadPersistence>,
    queue: Arc<InMemoryRefreshQueue>,
    sticky_store: Arc<InMemoryStickyBucketStore>,

    // =========================================================================
    // SERVICES
    // =========================================================================
    payload: Arc<PayloadService>,
    evaluator: SampleEvaluator,
    staleness: StalenessClassifier,
}

impl FlagEngine {
    /// Wire every subsystem with in-memory stores.
    #[instrument(name = "engine_init", skip(config))]
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        info!("Initializing stores");
        let event_bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = event_bus.clone();
        let features = Arc::new(InMemoryFeatureStore::with_publisher(publisher.clone()));
        let saved_groups = Arc::new(
            InMemorySavedGroupStore::with_publisher(publisher.clone())
                .sharing_revisions(features.revisions()),
        );
        let holdouts = Arc::new(
            InMemoryHoldoutStore::with_publisher(publisher.clone())
                .sharing_revisions(features.revisions()),
        );
        let organizations = Arc::new(
            InMemoryOrganizationStore::with_publisher(publisher.clone())
                .sharing_revisions(features.revisions()),
        );
        let persistence = Arc::new(InMemoryPayloadPersistence::new());
        let queue = Arc::new(InMemoryRefreshQueue::new());
        let sticky_store = Arc::new(InMemoryStickyBucketStore::new());

        info!("Initializing payload compiler");
        let payload = Arc::new(
            PayloadService::with_config(
                PayloadStores {
                    features: features.clone(),
                    saved_groups: saved_groups.clone(),
                    holdouts: holdouts.clone(),
                    organizations: organizations.clone(),
                },
                config.payload.clone(),
            )
            .with_persistence(persistence.clone())
            .with_publisher(publisher),
        );

        info!("Initializing evaluators");
        let bucketing =
            BucketingService::with_sticky_store(config.bucketing.clone(), sticky_store.clone());
        let evaluator =
            SampleEvaluator::with_bucketing(bucketing).with_config(config.evaluator.clone());
        let staleness = StalenessClassifier::with_config(config.staleness.clone());

        info!("Flag engine ready");
        Ok(Self {
            config,
            event_bus,
            features,
            saved_groups,
            holdouts,
            organizations,
            persistence,
            queue,
            sticky_store,
            payload,
            evaluator,
            staleness,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<InMemoryEventBus> {
        &self.event_bus
    }

    pub fn features(&self) -> &Arc<InMemoryFeatureStore> {
        &self.features
    }

    pub fn saved_groups(&self) -> &Arc<InMemorySavedGroupStore> {
        &self.saved_groups
    }

    pub fn holdouts(&self) -> &Arc<InMemoryHoldoutStore> {
        &self.holdouts
    }

    pub fn organizations(&self) -> &Arc<InMemoryOrganizationStore> {
        &self.organizations
    }

    pub fn persistence(&self) -> &Arc<InMemoryPayloadPersistence> {
        &self.persistence
    }

    pub fn queue(&self) -> &Arc<InMemoryRefreshQueue> {
        &self.queue
    }

    pub fn sticky_store(&self) -> &Arc<InMemoryStickyBucketStore> {
        &self.sticky_store
    }

    pub fn payload(&self) -> &Arc<PayloadService> {
        &self.payload
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start the invalidation listener and the refresh worker.
    pub fn start(&self) -> EngineWorkers {
        let subscription = self.event_bus.subscribe(EventFilter::invalidations());
        let listener = Arc::new(InvalidationListener::new(
            self.organizations.clone(),
            self.queue.clone(),
        ))
        .spawn(subscription);
        let worker = Arc::new(RefreshWorker::new(self.payload.clone(), self.queue.clone())).spawn();
        info!("Refresh pipeline started");
        EngineWorkers { listener, worker }
    }

    /// Close the queue, let the worker drain it, then stop the listener.
    /// Resolves to the number of jobs the worker processed.
    pub async fn shutdown(&self, workers: EngineWorkers) -> usize {
        self.queue.close();
        let processed = workers.worker.await.unwrap_or_default();
        workers.listener.abort();
        info!(processed, "Refresh pipeline stopped");
        processed
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Load an organization with its features, saved groups and holdouts.
    /// Returns the number of features stored.
    pub async fn load_fixture(&self, json: &str) -> anyhow::Result<usize> {
        let fixture: Fixture = serde_json::from_str(json).context("parsing fixture")?;
        let organization = fixture.organization.id.clone();
        if let Some(foreign) = fixture
            .features
            .iter()
            .find(|f| f.organization != organization)
        {
            bail!(
                "feature {} belongs to {}, not {}",
                foreign.id,
                foreign.organization,
                organization
            );
        }

        self.organizations.upsert(fixture.organization).await;
        for group in fixture.saved_groups {
            self.saved_groups.upsert(&organization, group).await;
        }
        for holdout in fixture.holdouts {
            self.holdouts.upsert(&organization, holdout).await;
        }
        let count = fixture.features.len();
        for feature in fixture.features {
            self.features.upsert(feature).await;
        }
        info!(organization = %organization, features = count, "Fixture loaded");
        Ok(count)
    }

    /// Store `feature` unless the edit would introduce a prerequisite cycle.
    pub async fn save_feature(&self, feature: Feature) -> Result<(), EngineError> {
        self.check_update(&feature).await?;
        self.features.upsert(feature).await;
        Ok(())
    }

    pub async fn save_saved_group(&self, organization: &str, group: SavedGroup) {
        self.saved_groups.upsert(organization, group).await;
    }

    pub async fn save_holdout(&self, organization: &str, holdout: Holdout) {
        self.holdouts.upsert(organization, holdout).await;
    }

    /// Replace the organization's environments, connections and settings.
    pub async fn save_organization(&self, organization: Organization) {
        self.organizations.upsert(organization).await;
    }

    /// Refuse an edit that would close a prerequisite cycle.
    pub async fn check_update(&self, updated: &Feature) -> Result<(), EngineError> {
        let features = self.payload.snapshot(&updated.organization).await?.features;
        check_update(&features, updated)?;
        Ok(())
    }

    // =========================================================================
    // PAYLOADS
    // =========================================================================

    /// `{features, experiments, savedGroupsInUse, holdouts}` for a client
    /// with `capabilities`.
    pub async fn compile_feature_definitions(
        &self,
        organization: &str,
        environment: &str,
        project_filter: &[ProjectId],
        capabilities: &ConnectionCapabilities,
    ) -> Result<PayloadContents, EngineError> {
        Ok(self
            .payload
            .compile_feature_definitions(organization, environment, project_filter, capabilities)
            .await?)
    }

    /// Delivery contents for a configured SDK connection.
    pub async fn payload_for_connection(
        &self,
        organization: &str,
        connection_id: &str,
    ) -> Result<PayloadContents, EngineError> {
        Ok(self
            .payload
            .payload_for_connection(organization, connection_id)
            .await?)
    }

    pub async fn cached_payload(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Option<Arc<SdkPayload>>, EngineError> {
        Ok(self.payload.get(organization, environment).await?)
    }

    pub async fn refresh(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<RefreshOutcome, EngineError> {
        Ok(self.payload.refresh_environment(organization, environment).await?)
    }

    // =========================================================================
    // EVALUATION
    // =========================================================================

    /// Evaluate one feature for a sample user against a fresh compilation
    /// of `environment`, with the full rule trace.
    pub async fn evaluate_for_sample(
        &self,
        organization: &str,
        feature_id: &str,
        environment: &str,
        attributes: &Attributes,
    ) -> Result<EvaluationResult, EngineError> {
        let payload = self.payload.compile_payload(organization, environment, &[]).await?;
        if let Some(reason) = payload.errors.get(feature_id) {
            return Err(EngineError::FeatureExcluded {
                feature_id: feature_id.to_string(),
                reason: reason.clone(),
            });
        }

        let ctx = EvaluationContext::from_contents(&payload.contents, attributes);
        Ok(self.evaluator.evaluate(feature_id, &ctx).await?)
    }

    /// Evaluate every feature a remote-evaluation connection serves.
    pub async fn evaluate_remote(
        &self,
        organization: &str,
        connection_id: &str,
        attributes: &Attributes,
    ) -> Result<BTreeMap<FeatureId, EvaluationResult>, EngineError> {
        let org = self
            .organizations
            .get_organization(organization)
            .await?
            .ok_or_else(|| PayloadError::UnknownOrganization {
                organization: organization.to_string(),
            })?;
        let connection = org.connection(connection_id).ok_or_else(|| {
            PayloadError::UnknownConnection {
                organization: organization.to_string(),
                connection_id: connection_id.to_string(),
            }
        })?;
        if !connection.capabilities.remote_evaluation {
            return Err(EngineError::RemoteEvaluationDisabled {
                connection_id: connection_id.to_string(),
            });
        }

        let contents = self
            .payload
            .payload_for_connection(organization, connection_id)
            .await?;
        let ctx = EvaluationContext::from_contents(&contents, attributes);
        Ok(self.evaluator.evaluate_all(&ctx).await)
    }

    // =========================================================================
    // STALENESS
    // =========================================================================

    pub async fn classify_staleness(
        &self,
        organization: &str,
        feature_id: &str,
    ) -> Result<StalenessReport, EngineError> {
        let snapshot = self.payload.snapshot(organization).await?;
        let feature = snapshot
            .features
            .iter()
            .find(|f| f.id == feature_id)
            .ok_or_else(|| EngineError::UnknownFeature {
                organization: organization.to_string(),
                feature_id: feature_id.to_string(),
            })?;
        let ctx = StalenessContext::new(&snapshot.features, &snapshot.organization.environments);
        Ok(self.staleness.classify_staleness(feature, &ctx))
    }

    pub async fn classify_all(&self, organization: &str) -> Result<Vec<StalenessReport>, EngineError> {
        let snapshot = self.payload.snapshot(organization).await?;
        let ctx = StalenessContext::new(&snapshot.features, &snapshot.organization.environments);
        Ok(self.staleness.classify_all(&ctx))
    }
}
