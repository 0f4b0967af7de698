//! # Flag Events
//!
//! Change notifications emitted by the stores that feed the compiler.
//! Every event names the organization it belongs to plus enough scope
//! (environments, projects, connections) for the payload cache to limit
//! its refresh to the affected keys.

use serde::{Deserialize, Serialize};
use shared_types::entities::{
    ConnectionId, EnvironmentId, FeatureId, HoldoutId, OrganizationId, ProjectId, SavedGroupId,
};

/// All events that can be published on the flag bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlagEvent {
    // =========================================================================
    // Feature Store
    // =========================================================================
    /// A feature was created.
    #[serde(rename_all = "camelCase")]
    FeatureCreated {
        /// Owning organization.
        organization: OrganizationId,
        /// Feature key.
        feature_id: FeatureId,
        /// Project of the feature.
        project: Option<ProjectId>,
        /// Environments that carry settings for the feature.
        environments: Vec<EnvironmentId>,
    },

    /// A feature was updated. `previous_project` is set when the project moved.
    #[serde(rename_all = "camelCase")]
    FeatureUpdated {
        /// Owning organization.
        organization: OrganizationId,
        /// Feature key.
        feature_id: FeatureId,
        /// Project after the update.
        project: Option<ProjectId>,
        /// Project before the update, if it changed.
        previous_project: Option<ProjectId>,
        /// Environments whose compiled output may differ.
        environments: Vec<EnvironmentId>,
        /// New revision number.
        revision: u64,
    },

    /// A feature was deleted.
    #[serde(rename_all = "camelCase")]
    FeatureDeleted {
        /// Owning organization.
        organization: OrganizationId,
        /// Feature key.
        feature_id: FeatureId,
        /// Project of the deleted feature.
        project: Option<ProjectId>,
        /// Environments that carried settings.
        environments: Vec<EnvironmentId>,
    },

    // =========================================================================
    // Targeting constructs
    // =========================================================================
    /// A saved group changed. Affects every environment of its projects.
    #[serde(rename_all = "camelCase")]
    SavedGroupChanged {
        /// Owning organization.
        organization: OrganizationId,
        /// Saved group id.
        saved_group_id: SavedGroupId,
        /// Project scoping of the group (empty = all).
        projects: Vec<ProjectId>,
    },

    /// A holdout changed, including a ramp step taking effect.
    #[serde(rename_all = "camelCase")]
    HoldoutChanged {
        /// Owning organization.
        organization: OrganizationId,
        /// Holdout id.
        holdout_id: HoldoutId,
        /// Project scoping (empty = all).
        projects: Vec<ProjectId>,
        /// Environments where the holdout is enabled.
        environments: Vec<EnvironmentId>,
    },

    // =========================================================================
    // Organization
    // =========================================================================
    /// Environment settings changed. Descendant environments are affected too.
    #[serde(rename_all = "camelCase")]
    EnvironmentSettingsChanged {
        /// Owning organization.
        organization: OrganizationId,
        /// Environment id.
        environment: EnvironmentId,
    },

    /// An SDK connection's capabilities or scope changed.
    #[serde(rename_all = "camelCase")]
    ConnectionChanged {
        /// Owning organization.
        organization: OrganizationId,
        /// Connection id.
        connection_id: ConnectionId,
    },

    /// The type of a custom field changed; stored values may have been
    /// migrated and must be re-serialized.
    #[serde(rename_all = "camelCase")]
    CustomFieldTypeChanged {
        /// Owning organization.
        organization: OrganizationId,
        /// Custom field key.
        field: String,
        /// Projects the field applies to (empty = all).
        projects: Vec<ProjectId>,
    },

    // =========================================================================
    // Payload cache
    // =========================================================================
    /// A payload was recompiled and swapped into the cache.
    #[serde(rename_all = "camelCase")]
    PayloadRefreshed {
        /// Owning organization.
        organization: OrganizationId,
        /// Environment of the payload.
        environment: EnvironmentId,
        /// Generation that was committed.
        generation: u64,
    },
}

impl FlagEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::FeatureCreated { .. }
            | Self::FeatureUpdated { .. }
            | Self::FeatureDeleted { .. } => EventTopic::Features,
            Self::SavedGroupChanged { .. } => EventTopic::SavedGroups,
            Self::HoldoutChanged { .. } => EventTopic::Holdouts,
            Self::EnvironmentSettingsChanged { .. }
            | Self::ConnectionChanged { .. }
            | Self::CustomFieldTypeChanged { .. } => EventTopic::Organization,
            Self::PayloadRefreshed { .. } => EventTopic::Payloads,
        }
    }

    /// Organization the event belongs to.
    #[must_use]
    pub fn organization(&self) -> &str {
        match self {
            Self::FeatureCreated { organization, .. }
            | Self::FeatureUpdated { organization, .. }
            | Self::FeatureDeleted { organization, .. }
            | Self::SavedGroupChanged { organization, .. }
            | Self::HoldoutChanged { organization, .. }
            | Self::EnvironmentSettingsChanged { organization, .. }
            | Self::ConnectionChanged { organization, .. }
            | Self::CustomFieldTypeChanged { organization, .. }
            | Self::PayloadRefreshed { organization, .. } => organization,
        }
    }

    /// Whether the event should trigger a payload refresh.
    #[must_use]
    pub fn invalidates_payloads(&self) -> bool {
        !matches!(self, Self::PayloadRefreshed { .. })
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Feature create/update/delete.
    Features,
    /// Saved group changes.
    SavedGroups,
    /// Holdout changes and ramp steps.
    Holdouts,
    /// Environment, connection and custom-field changes.
    Organization,
    /// Payload cache commits.
    Payloads,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Organizations to include. Empty means all organizations.
    pub organizations: Vec<OrganizationId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            organizations: Vec::new(),
        }
    }

    /// Restrict the filter to one organization.
    #[must_use]
    pub fn for_organization(mut self, organization: impl Into<OrganizationId>) -> Self {
        self.organizations.push(organization.into());
        self
    }

    /// Events that should trigger a payload refresh.
    #[must_use]
    pub fn invalidations() -> Self {
        Self::topics(vec![
            EventTopic::Features,
            EventTopic::SavedGroups,
            EventTopic::Holdouts,
            EventTopic::Organization,
        ])
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &FlagEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let org_match = self.organizations.is_empty()
            || self.organizations.iter().any(|o| o == event.organization());

        topic_match && org_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_updated(org: &str) -> FlagEvent {
        FlagEvent::FeatureUpdated {
            organization: org.into(),
            feature_id: "checkout".into(),
            project: Some("p1".into()),
            previous_project: None,
            environments: vec!["production".into()],
            revision: 2,
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(feature_updated("org_1").topic(), EventTopic::Features);
        let ramp = FlagEvent::HoldoutChanged {
            organization: "org_1".into(),
            holdout_id: "h1".into(),
            projects: vec![],
            environments: vec!["production".into()],
        };
        assert_eq!(ramp.topic(), EventTopic::Holdouts);
        assert_eq!(ramp.organization(), "org_1");
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&feature_updated("org_1")));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::SavedGroups]);
        assert!(!filter.matches(&feature_updated("org_1")));

        let group = FlagEvent::SavedGroupChanged {
            organization: "org_1".into(),
            saved_group_id: "grp_1".into(),
            projects: vec![],
        };
        assert!(filter.matches(&group));
    }

    #[test]
    fn test_filter_by_organization() {
        let filter = EventFilter::all().for_organization("org_1");
        assert!(filter.matches(&feature_updated("org_1")));
        assert!(!filter.matches(&feature_updated("org_2")));
    }

    #[test]
    fn test_invalidation_filter_skips_payload_commits() {
        let refreshed = FlagEvent::PayloadRefreshed {
            organization: "org_1".into(),
            environment: "production".into(),
            generation: 3,
        };
        assert!(!refreshed.invalidates_payloads());
        assert!(!EventFilter::invalidations().matches(&refreshed));
        assert!(EventFilter::invalidations().matches(&feature_updated("org_1")));
    }

    #[test]
    fn test_serde_tag() {
        let encoded = serde_json::to_value(feature_updated("org_1")).unwrap();
        assert_eq!(encoded["type"], "featureUpdated");
        assert_eq!(encoded["featureId"], "checkout");
    }
}
