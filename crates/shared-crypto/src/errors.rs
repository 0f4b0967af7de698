//! Failures sealing or opening encrypted payload sections.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Connection encryption key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("Connection encryption key is not hex: {0}")]
    KeyEncoding(String),

    #[error("Could not seal payload section")]
    Seal,

    /// Wrong key or tampered ciphertext
    #[error("Could not open payload section")]
    Open,

    #[error("Malformed sealed payload: {0}")]
    Malformed(String),
}
