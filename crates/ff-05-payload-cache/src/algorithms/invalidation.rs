//! Mapping change notifications onto payload keys and connections
//!
//! A change only refreshes the environments (and their descendants) whose
//! compiled output can differ, and only notifies connections whose
//! environment and projects overlap those keys.

use shared_bus::FlagEvent;
use shared_types::{ConnectionId, EnvironmentId, Organization, PayloadKey, ProjectId};
use std::collections::BTreeSet;

/// Payload keys affected by `event`.
pub fn payload_keys_for(event: &FlagEvent, organization: &Organization) -> BTreeSet<PayloadKey> {
    match event {
        FlagEvent::FeatureCreated {
            project,
            environments,
            ..
        }
        | FlagEvent::FeatureDeleted {
            project,
            environments,
            ..
        } => keys(
            organization,
            &expand_environments(organization, environments),
            &project.iter().cloned().collect::<Vec<_>>(),
        ),
        FlagEvent::FeatureUpdated {
            project,
            previous_project,
            environments,
            ..
        } => {
            let projects: Vec<ProjectId> = project.iter().chain(previous_project.iter()).cloned().collect();
            keys(
                organization,
                &expand_environments(organization, environments),
                &projects,
            )
        }
        FlagEvent::SavedGroupChanged { projects, .. }
        | FlagEvent::CustomFieldTypeChanged { projects, .. } => {
            keys(organization, &all_environments(organization), projects)
        }
        FlagEvent::HoldoutChanged {
            projects,
            environments,
            ..
        } => keys(
            organization,
            &expand_environments(organization, environments),
            projects,
        ),
        FlagEvent::EnvironmentSettingsChanged { environment, .. } => keys(
            organization,
            &organization.environment_with_descendants(environment),
            &[],
        ),
        FlagEvent::ConnectionChanged { connection_id, .. } => organization
            .connection(connection_id)
            .map(|c| PayloadKey::new(c.environment.clone(), None))
            .into_iter()
            .collect(),
        FlagEvent::PayloadRefreshed { .. } => BTreeSet::new(),
    }
}

/// Connections that serve any of `keys`.
pub fn affected_connections(
    organization: &Organization,
    keys: &BTreeSet<PayloadKey>,
) -> BTreeSet<ConnectionId> {
    organization
        .connections
        .iter()
        .filter(|connection| {
            keys.iter().any(|key| {
                key.environment == connection.environment
                    && match &key.project {
                        None => true,
                        Some(project) => {
                            connection.projects.is_empty() || connection.projects.contains(project)
                        }
                    }
            })
        })
        .map(|c| c.id.clone())
        .collect()
}

/// Listed environments plus descendants; an empty list means all of them.
fn expand_environments(
    organization: &Organization,
    environments: &[EnvironmentId],
) -> BTreeSet<EnvironmentId> {
    if environments.is_empty() {
        return all_environments(organization);
    }
    environments
        .iter()
        .flat_map(|env| organization.environment_with_descendants(env))
        .collect()
}

fn all_environments(organization: &Organization) -> BTreeSet<EnvironmentId> {
    organization.environments.iter().map(|e| e.id.clone()).collect()
}

fn keys(
    organization: &Organization,
    environments: &BTreeSet<EnvironmentId>,
    projects: &[ProjectId],
) -> BTreeSet<PayloadKey> {
    let known: BTreeSet<&str> = organization.environments.iter().map(|e| e.id.as_str()).collect();
    let mut out = BTreeSet::new();
    for environment in environments.iter().filter(|e| known.contains(e.as_str())) {
        if projects.is_empty() {
            out.insert(PayloadKey::new(environment.clone(), None));
        }
        for project in projects {
            out.insert(PayloadKey::new(environment.clone(), Some(project.clone())));
        }
    }
    out
}
