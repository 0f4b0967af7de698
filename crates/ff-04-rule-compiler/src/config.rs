//! Configuration for the Rule Compiler

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Accepted distance of experiment weights from a sum of 1.0
    pub weight_tolerance: f64,
    /// Maximum parent hops when inheriting environment settings
    pub max_environment_depth: usize,
    /// Prefix for generated rule ids
    pub rule_id_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: 0.01,
            max_environment_depth: 4,
            rule_id_prefix: "fr_".to_string(),
        }
    }
}
