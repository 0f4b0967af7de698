//! Refresh jobs and their outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{ConnectionId, EnvironmentId, OrganizationId, PayloadKey};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A scoped recompilation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshJob {
    pub id: Uuid,
    pub organization: OrganizationId,
    pub payload_keys: BTreeSet<PayloadKey>,
    pub affected_connections: BTreeSet<ConnectionId>,
    pub requested_at: DateTime<Utc>,
}

impl RefreshJob {
    pub fn new(
        organization: impl Into<OrganizationId>,
        payload_keys: BTreeSet<PayloadKey>,
        affected_connections: BTreeSet<ConnectionId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization: organization.into(),
            payload_keys,
            affected_connections,
            requested_at: Utc::now(),
        }
    }

    /// Environments to recompile; project scoping only narrows connections.
    pub fn environments(&self) -> BTreeSet<EnvironmentId> {
        self.payload_keys
            .iter()
            .map(|k| k.environment.clone())
            .collect()
    }

    /// Fold `other` (same organization) into this job.
    pub fn merge(&mut self, other: RefreshJob) {
        self.payload_keys.extend(other.payload_keys);
        self.affected_connections.extend(other.affected_connections);
        self.requested_at = self.requested_at.max(other.requested_at);
    }

    pub fn is_empty(&self) -> bool {
        self.payload_keys.is_empty()
    }
}

/// What a refresh of one (organization, environment) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new payload was swapped into the cache
    Committed {
        environment: EnvironmentId,
        generation: u64,
    },
    /// A later refresh for the same key was requested first
    Superseded {
        environment: EnvironmentId,
        generation: u64,
        latest: u64,
    },
}

impl RefreshOutcome {
    pub fn environment(&self) -> &str {
        match self {
            Self::Committed { environment, .. } | Self::Superseded { environment, .. } => {
                environment
            }
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}
