//! Consistent store snapshot

use shared_types::{
    Feature, Holdout, Organization, SavedGroup, SavedGroupId, SavedGroupKind,
};
use std::collections::BTreeMap;

/// Everything one compilation pass reads, taken at a single revision.
#[derive(Debug, Clone, Default)]
pub struct OrgSnapshot {
    pub organization: Organization,
    pub features: Vec<Feature>,
    pub saved_groups: BTreeMap<SavedGroupId, SavedGroup>,
    pub holdouts: Vec<Holdout>,
    /// Feature store revision the snapshot was read at
    pub revision: u64,
}

impl OrgSnapshot {
    /// Values of the list groups among `ids`, for `savedGroupsInUse`.
    pub fn list_values<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a SavedGroupId>,
    ) -> BTreeMap<SavedGroupId, Vec<String>> {
        ids.into_iter()
            .filter_map(|id| match self.saved_groups.get(id).map(|g| &g.kind) {
                Some(SavedGroupKind::List { values, .. }) => Some((id.clone(), values.clone())),
                _ => None,
            })
            .collect()
    }
}
