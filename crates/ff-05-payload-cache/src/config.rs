//! Payload Cache Configuration

use ff_04_rule_compiler::CompilerConfig;
use serde::{Deserialize, Serialize};
use shared_types::PAYLOAD_SCHEMA_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Schema version stamped on every payload
    pub schema_version: u32,
    /// Fresh snapshots taken after a torn read before giving up
    pub consistency_retries: u32,
    /// Write committed payloads through to the persistence layer
    pub persist_payloads: bool,
    pub compiler: CompilerConfig,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            schema_version: PAYLOAD_SCHEMA_VERSION,
            consistency_retries: 1,
            persist_payloads: true,
            compiler: CompilerConfig::default(),
        }
    }
}
