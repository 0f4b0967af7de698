//! Configuration for the Staleness Classifier

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessConfig {
    /// A feature edited within this many days is never stale
    pub recently_updated_days: i64,
    /// A draft untouched for this many days counts as abandoned
    pub abandoned_draft_days: i64,
    /// Maximum parent hops when inheriting environment settings
    pub max_environment_depth: usize,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            recently_updated_days: 7,
            abandoned_draft_days: 30,
            max_environment_depth: 4,
        }
    }
}
