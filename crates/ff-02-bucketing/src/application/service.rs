//! Bucketing Service
//!
//! Places a user into a variation:
//! 1. Sticky assignment, when allowed and present
//! 2. Namespace check
//! 3. Hash fraction against coverage-scaled bucket ranges
//! 4. Optional write-back of the fresh assignment

use crate::algorithms::{bucket_ranges, choose_variation_in_ranges, hash_fraction, hash_seed, in_namespace};
use crate::config::BucketingConfig;
use crate::domain::errors::BucketingError;
use crate::domain::value_objects::{
    Assignment, AssignmentOutcome, AssignmentRequest, AssignmentSource, Exclusion,
    StickyAssignmentKey,
};
use crate::ports::outbound::StickyBucketStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BucketingService {
    config: BucketingConfig,
    sticky_store: Option<Arc<dyn StickyBucketStore>>,
}

impl BucketingService {
    /// Service without a sticky store; assignments are purely hash based.
    pub fn new(config: BucketingConfig) -> Self {
        Self {
            config,
            sticky_store: None,
        }
    }

    pub fn with_sticky_store(config: BucketingConfig, store: Arc<dyn StickyBucketStore>) -> Self {
        Self {
            config,
            sticky_store: Some(store),
        }
    }

    pub fn config(&self) -> &BucketingConfig {
        &self.config
    }

    fn sticky_store_for(&self, request: &AssignmentRequest) -> Option<&Arc<dyn StickyBucketStore>> {
        if self.config.sticky_bucketing_enabled && request.sticky {
            self.sticky_store.as_ref()
        } else {
            None
        }
    }

    /// Pure hash-based placement, ignoring sticky state.
    pub fn compute(&self, request: &AssignmentRequest) -> Result<AssignmentOutcome, BucketingError> {
        if let Some(namespace) = &request.namespace {
            if !in_namespace(&request.hash_value, namespace) {
                return Ok(AssignmentOutcome::Excluded {
                    reason: Exclusion::NotInNamespace,
                });
            }
        }

        let ranges = bucket_ranges(
            &request.weights,
            request.coverage,
            self.config.weight_tolerance,
        )?;
        let seed = hash_seed(&request.tracking_key, &request.hash_value);
        let fraction = hash_fraction(&seed, request.hash_version);

        Ok(match choose_variation_in_ranges(fraction, &ranges) {
            Some(variation) => AssignmentOutcome::Assigned(Assignment {
                variation,
                fraction: Some(fraction),
                source: AssignmentSource::Hashed,
            }),
            None => AssignmentOutcome::Excluded {
                reason: Exclusion::NotInCoverage,
            },
        })
    }

    /// Place the user, honouring sticky assignments.
    ///
    /// With `persist` false the sticky store is only read, never written.
    pub async fn assign(
        &self,
        request: &AssignmentRequest,
        persist: bool,
    ) -> Result<AssignmentOutcome, BucketingError> {
        let store = self.sticky_store_for(request);
        let key = StickyAssignmentKey::new(
            &request.hash_attribute,
            &request.hash_value,
            request.tracking_key.clone(),
            request.bucket_version,
        );

        if let Some(store) = store {
            match store.get_assignment(&key).await {
                Ok(Some(stored)) => {
                    if let Some(variation) = request.variation_keys.iter().position(|k| *k == stored) {
                        debug!(
                            tracking_key = %request.tracking_key,
                            variation,
                            "Using sticky assignment"
                        );
                        return Ok(AssignmentOutcome::Assigned(Assignment {
                            variation,
                            fraction: None,
                            source: AssignmentSource::Sticky,
                        }));
                    }
                    debug!(
                        tracking_key = %request.tracking_key,
                        stored = %stored,
                        "Sticky assignment refers to a removed variation"
                    );
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Sticky lookup failed, falling back to hashing"),
            }
        }

        let outcome = self.compute(request)?;

        if let (true, Some(store), AssignmentOutcome::Assigned(assignment)) = (persist, store, &outcome) {
            if let Some(variation_key) = request.variation_keys.get(assignment.variation) {
                store.put_assignment(key, variation_key.clone()).await?;
            }
        }

        Ok(outcome)
    }
}

impl Default for BucketingService {
    fn default() -> Self {
        Self::new(BucketingConfig::default())
    }
}
