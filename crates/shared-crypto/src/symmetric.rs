//! # Payload Encryption
//!
//! Connections with encryption enabled receive `features` and `savedGroups`
//! as sealed strings: `"<nonce hex>.<ciphertext hex>"`, AES-256-GCM with a
//! fresh 96-bit nonce per seal. Keys are configured as 64 hex characters.

use crate::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroize;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A connection's encryption key. Wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        let actual = bytes.len();
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyLength { expected: KEY_LEN, actual })?;
        Ok(Self(bytes))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Seal a serialized payload section.
pub fn encrypt_string(key: &SecretKey, plaintext: &str) -> Result<String, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Seal)?;
    Ok(format!("{}.{}", hex::encode(nonce), hex::encode(ciphertext)))
}

/// Open a section sealed by [`encrypt_string`].
pub fn decrypt_string(key: &SecretKey, sealed: &str) -> Result<String, CryptoError> {
    let (nonce_hex, ciphertext_hex) = sealed
        .split_once('.')
        .ok_or_else(|| CryptoError::Malformed("missing '.' separator".to_string()))?;

    let nonce = hex::decode(nonce_hex).map_err(|e| CryptoError::Malformed(e.to_string()))?;
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Malformed(format!(
            "nonce is {} bytes, expected {}",
            nonce.len(),
            NONCE_LEN
        )));
    }
    let ciphertext = hex::decode(ciphertext_hex).map_err(|e| CryptoError::Malformed(e.to_string()))?;

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::Open)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
}
