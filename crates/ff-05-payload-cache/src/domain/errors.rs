//! Error types for the Payload Cache

use shared_crypto::CryptoError;
use shared_types::{CacheConsistencyError, ConnectionId, EnvironmentId, OrganizationId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    /// A snapshot stayed torn after the configured retries
    #[error(transparent)]
    Consistency(#[from] CacheConsistencyError),

    #[error("Unknown organization {organization}")]
    UnknownOrganization { organization: OrganizationId },

    #[error("Unknown environment {environment} in {organization}")]
    UnknownEnvironment {
        organization: OrganizationId,
        environment: EnvironmentId,
    },

    #[error("Unknown SDK connection {connection_id} in {organization}")]
    UnknownConnection {
        organization: OrganizationId,
        connection_id: ConnectionId,
    },

    #[error("Connection {connection_id} requires encryption but has no key")]
    MissingEncryptionKey { connection_id: ConnectionId },

    #[error("Encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A store or the persistence layer failed
    #[error("Store error: {0}")]
    Store(String),

    #[error("Refresh queue closed")]
    QueueClosed,
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
