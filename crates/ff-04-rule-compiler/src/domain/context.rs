//! Inputs of a compilation pass

use chrono::{DateTime, Utc};
use shared_types::{Environment, Feature, Holdout, SavedGroup, SavedGroupId};
use std::collections::BTreeMap;

/// Snapshot of everything a feature's rules may reference.
///
/// All slices come from one consistent read of the stores.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub environment: &'a Environment,
    /// Every environment of the organization, for inheritance
    pub environments: &'a [Environment],
    pub features: &'a [Feature],
    pub saved_groups: &'a BTreeMap<SavedGroupId, SavedGroup>,
    pub holdouts: &'a [Holdout],
    /// Replace `$inGroup` references with inline `$in` lists
    pub inline_saved_groups: bool,
    pub now: DateTime<Utc>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        environment: &'a Environment,
        environments: &'a [Environment],
        features: &'a [Feature],
        saved_groups: &'a BTreeMap<SavedGroupId, SavedGroup>,
        holdouts: &'a [Holdout],
    ) -> Self {
        Self {
            environment,
            environments,
            features,
            saved_groups,
            holdouts,
            inline_saved_groups: false,
            now: Utc::now(),
        }
    }

    pub fn with_inline_saved_groups(mut self, inline: bool) -> Self {
        self.inline_saved_groups = inline;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}
