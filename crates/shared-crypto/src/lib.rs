//! # Shared Crypto
//!
//! | Module | Algorithm | Use |
//! |--------|-----------|-----|
//! | `hashing` | SHA-256 | Secure attribute values in SDK payloads |
//! | `symmetric` | AES-256-GCM | Sealed `features` / `savedGroups` sections |

pub mod errors;
pub mod hashing;
pub mod symmetric;

pub use errors::CryptoError;
pub use hashing::hash_secure_value;
pub use symmetric::{decrypt_string, encrypt_string, SecretKey};
