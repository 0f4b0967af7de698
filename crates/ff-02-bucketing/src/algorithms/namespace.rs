//! Namespaces
//!
//! Experiments sharing a namespace id take disjoint `[start, end)` slices so
//! a user lands in at most one of them.

use super::hashing::hash_fraction;
use shared_types::{HashVersion, NamespaceRange};

/// Whether `value` falls into the namespace slice.
pub fn in_namespace(value: &str, namespace: &NamespaceRange) -> bool {
    let seed = format!("__{}_{}", namespace.id, value);
    let fraction = hash_fraction(&seed, HashVersion::V1);
    fraction >= namespace.start && fraction < namespace.end
}
