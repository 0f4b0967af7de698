//! Configuration for the Bucketing Engine

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketingConfig {
    /// Engine-wide switch; the organization setting and the rule must also allow it
    pub sticky_bucketing_enabled: bool,
    /// Accepted distance of the weight sum from 1.0
    pub weight_tolerance: f64,
}

impl Default for BucketingConfig {
    fn default() -> Self {
        Self {
            sticky_bucketing_enabled: true,
            weight_tolerance: 0.01,
        }
    }
}
