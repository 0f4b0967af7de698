//! Payload Compiler Service
//!
//! Owns the payload cache. Every write goes through `refresh`, which reads
//! one consistent snapshot of the stores, compiles every feature of the
//! environment, marks the result deployed and swaps it in whole.

use crate::algorithms::projection::{project_contents, ProjectionOptions};
use crate::algorithms::secure::hash_secure_attributes;
use crate::application::cache::{cache_key, PayloadCache};
use crate::config::PayloadConfig;
use crate::domain::errors::PayloadError;
use crate::domain::jobs::RefreshOutcome;
use crate::domain::snapshot::OrgSnapshot;
use crate::ports::inbound::PayloadCacheApi;
use crate::ports::outbound::{
    FeatureStore, HoldoutStore, OrganizationStore, PayloadPersistence, SavedGroupStore,
};
use async_trait::async_trait;
use chrono::Utc;
use ff_04_rule_compiler::{CompileContext, CompiledEnvironment, RuleCompiler};
use flag_telemetry::{
    log_feature_event, HistogramTimer, CACHE_HITS, CACHE_MISSES, COMPILE_DURATION,
    COMPILE_WARNINGS, CYCLE_DETECTIONS, PAYLOAD_COMPILATIONS, SUPERSEDED_REFRESHES,
};
use shared_bus::{EventPublisher, FlagEvent};
use shared_crypto::{encrypt_string, SecretKey};
use shared_types::{
    CacheConsistencyError, ConfigurationError, ConnectionCapabilities, ConnectionId,
    Organization, PayloadContents, PayloadKey, ProjectId, SdkPayload,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Refreshes a cold read may start before giving up on an empty cache.
const COLD_READ_ATTEMPTS: usize = 3;

/// Stores the service reads from.
pub struct PayloadStores {
    pub features: Arc<dyn FeatureStore>,
    pub saved_groups: Arc<dyn SavedGroupStore>,
    pub holdouts: Arc<dyn HoldoutStore>,
    pub organizations: Arc<dyn OrganizationStore>,
}

pub struct PayloadService {
    stores: PayloadStores,
    persistence: Option<Arc<dyn PayloadPersistence>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    compiler: RuleCompiler,
    cache: PayloadCache,
    config: PayloadConfig,
}

impl PayloadService {
    pub fn new(stores: PayloadStores) -> Self {
        Self::with_config(stores, PayloadConfig::default())
    }

    pub fn with_config(stores: PayloadStores, config: PayloadConfig) -> Self {
        Self {
            stores,
            persistence: None,
            publisher: None,
            compiler: RuleCompiler::with_config(config.compiler.clone()),
            cache: PayloadCache::new(),
            config,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PayloadPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &PayloadConfig {
        &self.config
    }

    pub fn cache(&self) -> &PayloadCache {
        &self.cache
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    /// Read the organization's stores at a single revision.
    ///
    /// A revision change during the read is retried with a fresh snapshot
    /// up to `consistency_retries` times, then surfaced.
    pub async fn snapshot(&self, organization: &str) -> Result<OrgSnapshot, PayloadError> {
        let mut attempt = 0;
        loop {
            let before = self.stores.features.revision(organization).await?;

            let org = self
                .stores
                .organizations
                .get_organization(organization)
                .await?
                .ok_or_else(|| PayloadError::UnknownOrganization {
                    organization: organization.to_string(),
                })?;
            let features = self.stores.features.list_features(organization).await?;
            let saved_groups = self
                .stores
                .saved_groups
                .list_saved_groups(organization)
                .await?
                .into_iter()
                .map(|g| (g.id.clone(), g))
                .collect();
            let holdouts = self.stores.holdouts.list_active_holdouts(organization).await?;

            let after = self.stores.features.revision(organization).await?;
            if before == after {
                return Ok(OrgSnapshot {
                    organization: org,
                    features,
                    saved_groups,
                    holdouts,
                    revision: after,
                });
            }

            if attempt >= self.config.consistency_retries {
                return Err(CacheConsistencyError::SnapshotChanged {
                    organization: organization.to_string(),
                    before,
                    after,
                }
                .into());
            }
            attempt += 1;
            warn!(
                organization = %organization,
                before,
                after,
                attempt,
                "Torn snapshot, retrying"
            );
        }
    }

    /// Compile every feature of `environment` from `snapshot`.
    pub fn compile_snapshot(
        &self,
        snapshot: &OrgSnapshot,
        environment: &str,
    ) -> Result<CompiledEnvironment, PayloadError> {
        let org = &snapshot.organization;
        let env = org
            .environment(environment)
            .ok_or_else(|| PayloadError::UnknownEnvironment {
                organization: org.id.clone(),
                environment: environment.to_string(),
            })?;

        let ctx = CompileContext::new(
            env,
            &org.environments,
            &snapshot.features,
            &snapshot.saved_groups,
            &snapshot.holdouts,
        )
        .at(Utc::now());
        let compiled = self.compiler.compile_environment(&ctx);

        for warning in &compiled.warnings {
            COMPILE_WARNINGS
                .with_label_values(&[error_kind(&warning.error)])
                .inc();
            log_feature_event!(
                warn,
                "payload-cache",
                "Rule dropped during compilation",
                warning.feature_id,
                warning.environment,
                error = %warning.error
            );
        }
        for (feature_id, error) in &compiled.errors {
            if matches!(error, ConfigurationError::CyclicPrerequisite { .. }) {
                CYCLE_DETECTIONS.inc();
            }
            log_feature_event!(
                warn,
                "payload-cache",
                "Feature omitted from payload",
                feature_id,
                environment,
                error = %error
            );
        }
        Ok(compiled)
    }

    fn build_payload(
        &self,
        snapshot: &OrgSnapshot,
        compiled: CompiledEnvironment,
        generation: u64,
    ) -> SdkPayload {
        let contents = PayloadContents {
            saved_groups: snapshot.list_values(&compiled.saved_groups_in_use),
            features: compiled.features,
            experiments: compiled.experiments,
            holdouts: compiled.holdouts,
            encrypted_features: None,
            encrypted_saved_groups: None,
        };
        SdkPayload {
            organization: snapshot.organization.id.clone(),
            environment: compiled.environment,
            date_updated: Utc::now(),
            deployed: false,
            schema_version: self.config.schema_version,
            generation,
            contents,
            next_scheduled_update: compiled.next_scheduled_update,
            errors: compiled
                .errors
                .into_iter()
                .map(|(id, error)| (id, error.to_string()))
                .collect(),
        }
    }

    /// Recompile one environment and swap the result into the cache.
    pub async fn refresh_environment(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<RefreshOutcome, PayloadError> {
        let span = flag_telemetry::subsystem_span!(
            "refresh_payload",
            subsystem = "payload-cache",
            organization = %organization,
            environment = %environment
        );
        self.refresh_locked(organization, environment)
            .instrument(span)
            .await
    }

    async fn refresh_locked(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<RefreshOutcome, PayloadError> {
        let key = cache_key(organization, environment);
        let generation = self.cache.request_generation(&key);

        let writer = self.cache.writer(&key);
        let _guard = writer.lock().await;

        let latest = self.cache.latest_requested(&key);
        if latest > generation {
            SUPERSEDED_REFRESHES.inc();
            PAYLOAD_COMPILATIONS.with_label_values(&["superseded"]).inc();
            debug!(generation, latest, "Refresh superseded before compilation");
            return Ok(RefreshOutcome::Superseded {
                environment: environment.to_string(),
                generation,
                latest,
            });
        }

        let result = {
            let _timer = HistogramTimer::new(&COMPILE_DURATION);
            match self.snapshot(organization).await {
                Ok(snapshot) => self
                    .compile_snapshot(&snapshot, environment)
                    .map(|compiled| self.build_payload(&snapshot, compiled, generation)),
                Err(e) => Err(e),
            }
        };
        let mut payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                PAYLOAD_COMPILATIONS.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        if self.config.persist_payloads {
            if let Some(persistence) = &self.persistence {
                persistence
                    .save(&payload.organization, &payload.environment, &payload)
                    .await?;
                payload.deployed = true;
                persistence
                    .save(&payload.organization, &payload.environment, &payload)
                    .await?;
            }
        }
        payload.deployed = true;

        let features = payload.contents.features.len();
        self.cache.swap(key, Arc::new(payload));
        PAYLOAD_COMPILATIONS.with_label_values(&["committed"]).inc();
        info!(generation, features, "Payload committed");

        if let Some(publisher) = &self.publisher {
            publisher
                .publish(FlagEvent::PayloadRefreshed {
                    organization: organization.to_string(),
                    environment: environment.to_string(),
                    generation,
                })
                .await;
        }

        Ok(RefreshOutcome::Committed {
            environment: environment.to_string(),
            generation,
        })
    }

    async fn get_or_refresh(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Arc<SdkPayload>, PayloadError> {
        if let Some(payload) = self.get(organization, environment).await? {
            return Ok(payload);
        }
        let key = cache_key(organization, environment);
        for _ in 0..COLD_READ_ATTEMPTS {
            let outcome = self.refresh_environment(organization, environment).await?;
            if let Some(payload) = self.cache.get(&key) {
                return Ok(payload);
            }
            // a newer writer holds the slot but has not committed yet
            debug!(?outcome, "Cold read lost its refresh; retrying");
        }
        Err(PayloadError::Store("payload missing after refresh".to_string()))
    }

    async fn organization(&self, organization: &str) -> Result<Organization, PayloadError> {
        self.stores
            .organizations
            .get_organization(organization)
            .await?
            .ok_or_else(|| PayloadError::UnknownOrganization {
                organization: organization.to_string(),
            })
    }

    async fn definitions_for(
        &self,
        organization: &Organization,
        environment: &str,
        project_filter: &[ProjectId],
        capabilities: &ConnectionCapabilities,
    ) -> Result<PayloadContents, PayloadError> {
        let payload = self.get_or_refresh(&organization.id, environment).await?;
        let mut contents = project_contents(
            &payload.contents,
            &ProjectionOptions::new(project_filter, *capabilities),
        );
        if capabilities.hash_secure_attributes && !capabilities.remote_evaluation {
            hash_secure_attributes(
                &mut contents,
                &organization.settings.secure_attributes(),
                &organization.settings.secure_attribute_salt,
            );
        }
        Ok(contents)
    }
}

#[async_trait]
impl PayloadCacheApi for PayloadService {
    async fn compile_payload(
        &self,
        organization: &str,
        environment: &str,
        project_filter: &[ProjectId],
    ) -> Result<SdkPayload, PayloadError> {
        let snapshot = self.snapshot(organization).await?;
        let compiled = self.compile_snapshot(&snapshot, environment)?;
        let generation = self
            .cache
            .latest_requested(&cache_key(organization, environment));
        let mut payload = self.build_payload(&snapshot, compiled, generation);
        if !project_filter.is_empty() {
            payload.contents = project_contents(
                &payload.contents,
                &ProjectionOptions::new(project_filter, ConnectionCapabilities::full()),
            );
        }
        Ok(payload)
    }

    async fn get(
        &self,
        organization: &str,
        environment: &str,
    ) -> Result<Option<Arc<SdkPayload>>, PayloadError> {
        let key = cache_key(organization, environment);
        if let Some(payload) = self.cache.get(&key) {
            CACHE_HITS.inc();
            return Ok(Some(payload));
        }
        CACHE_MISSES.inc();

        let Some(persistence) = &self.persistence else {
            return Ok(None);
        };
        match persistence.load(organization, environment).await? {
            Some(payload) if payload.deployed => Ok(Some(self.cache.fill(key, Arc::new(payload)))),
            Some(_) => {
                let error = CacheConsistencyError::NotDeployed {
                    organization: organization.to_string(),
                    environment: environment.to_string(),
                };
                warn!(error = %error, "Ignoring persisted payload");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn refresh(
        &self,
        organization: &str,
        payload_keys: &BTreeSet<PayloadKey>,
        affected_connections: &BTreeSet<ConnectionId>,
    ) -> Result<Vec<RefreshOutcome>, PayloadError> {
        let environments: BTreeSet<&str> =
            payload_keys.iter().map(|k| k.environment.as_str()).collect();
        debug!(
            organization = %organization,
            environments = environments.len(),
            connections = affected_connections.len(),
            "Refreshing payloads"
        );

        let mut outcomes = Vec::with_capacity(environments.len());
        let mut failures = BTreeMap::new();
        for environment in environments {
            match self.refresh_environment(organization, environment).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(organization = %organization, environment = %environment, error = %e, "Refresh failed");
                    failures.insert(environment.to_string(), e);
                }
            }
        }

        match failures.into_values().next() {
            Some(error) => Err(error),
            None => Ok(outcomes),
        }
    }

    async fn compile_feature_definitions(
        &self,
        organization: &str,
        environment: &str,
        project_filter: &[ProjectId],
        capabilities: &ConnectionCapabilities,
    ) -> Result<PayloadContents, PayloadError> {
        let org = self.organization(organization).await?;
        self.definitions_for(&org, environment, project_filter, capabilities)
            .await
    }

    async fn payload_for_connection(
        &self,
        organization: &str,
        connection_id: &str,
    ) -> Result<PayloadContents, PayloadError> {
        let org = self.organization(organization).await?;
        let connection = org
            .connection(connection_id)
            .ok_or_else(|| PayloadError::UnknownConnection {
                organization: organization.to_string(),
                connection_id: connection_id.to_string(),
            })?;
        let caps = connection.capabilities;

        let mut contents = self
            .definitions_for(&org, &connection.environment, &connection.projects, &caps)
            .await?;

        if caps.encryption && !caps.remote_evaluation {
            let encoded = connection
                .encryption_key
                .as_deref()
                .ok_or_else(|| PayloadError::MissingEncryptionKey {
                    connection_id: connection.id.clone(),
                })?;
            let key = SecretKey::from_hex(encoded)?;

            let features = serde_json::to_string(&contents.features)?;
            contents.encrypted_features = Some(encrypt_string(&key, &features)?);
            contents.features.clear();

            if !contents.saved_groups.is_empty() {
                let groups = serde_json::to_string(&contents.saved_groups)?;
                contents.encrypted_saved_groups = Some(encrypt_string(&key, &groups)?);
                contents.saved_groups.clear();
            }
        }
        Ok(contents)
    }
}

fn error_kind(error: &ConfigurationError) -> &'static str {
    match error {
        ConfigurationError::CyclicPrerequisite { .. } => "cyclic_prerequisite",
        ConfigurationError::MalformedCondition { .. } => "malformed_condition",
        ConfigurationError::EmptySavedGroupReference { .. } => "empty_saved_group",
        ConfigurationError::UnknownSavedGroup { .. } => "unknown_saved_group",
        ConfigurationError::InvalidVariations { .. } => "invalid_variations",
        ConfigurationError::InvalidCoverage { .. } => "invalid_coverage",
    }
}
