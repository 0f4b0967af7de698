//! FNV-1a hashing into `[0, 1)`
//!
//! - v1: `fnv(seed) % 1000 / 1000`
//! - v2: `fnv(fnv(seed).to_string()) % 10000 / 10000`
//!
//! The second pass in v2 decorrelates experiments that share an attribute
//! value, and the finer modulus gives 0.01% resolution.

use shared_types::HashVersion;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
pub fn fnv1a32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// `trackingKey + "_" + attributeValue`.
pub fn hash_seed(tracking_key: &str, value: &str) -> String {
    format!("{}_{}", tracking_key, value)
}

/// Stable fraction in `[0, 1)` for `seed` under `version`.
pub fn hash_fraction(seed: &str, version: HashVersion) -> f64 {
    match version {
        HashVersion::V1 => f64::from(fnv1a32(seed) % 1000) / 1000.0,
        HashVersion::V2 => {
            let first = fnv1a32(seed).to_string();
            f64::from(fnv1a32(&first) % 10_000) / 10_000.0
        }
    }
}
