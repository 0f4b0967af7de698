//! Compiled `$regex` patterns
//!
//! Each pattern is compiled once per process. Patterns that fail to compile
//! are remembered too and keep evaluating to no-match.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Distinct patterns kept before the cache starts over.
const MAX_CACHED_PATTERNS: usize = 1024;

lazy_static! {
    static ref PATTERNS: RwLock<HashMap<String, Option<Regex>>> = RwLock::new(HashMap::new());
}

/// The compiled form of `pattern`, or `None` if it is not a valid regex.
pub fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(cached) = PATTERNS.read().get(pattern) {
        return cached.clone();
    }

    let regex = Regex::new(pattern).ok();
    let mut patterns = PATTERNS.write();
    if patterns.len() >= MAX_CACHED_PATTERNS {
        debug!(cached = patterns.len(), "Regex cache full; clearing");
        patterns.clear();
    }
    patterns
        .entry(pattern.to_string())
        .or_insert(regex)
        .clone()
}
