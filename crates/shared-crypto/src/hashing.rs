//! # Secure Attribute Hashing
//!
//! Secure attributes (`secureString` and friends) are never shipped in
//! clear text: both the payload and the SDK compare `sha256(salt + value)`.

use sha2::{Digest, Sha256};

/// `sha256(salt + value)` as lowercase hex.
pub fn hash_secure_value(salt: &str, value: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(value.as_bytes())
        .finalize();
    hex::encode(digest)
}
