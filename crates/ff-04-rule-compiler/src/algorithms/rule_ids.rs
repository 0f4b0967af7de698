//! Rule id normalization
//!
//! Authored ids are kept. Missing ids are derived from the rule's own
//! content, so they only change when that rule changes. Duplicates get a
//! numeric suffix.

use ff_02_bucketing::fnv1a32;
use shared_types::Rule;
use std::collections::BTreeSet;

/// Id for `rule`, generating one from its content when empty.
pub fn normalize_rule_id(prefix: &str, feature_id: &str, rule: &Rule) -> String {
    if !rule.id.trim().is_empty() {
        return rule.id.clone();
    }
    let content = serde_json::to_string(rule).unwrap_or_default();
    format!(
        "{}{:08x}",
        prefix,
        fnv1a32(&format!("{}:{}", feature_id, content))
    )
}

/// Hands out ids unique within one feature and environment.
#[derive(Debug, Default)]
pub struct RuleIdAllocator {
    used: BTreeSet<String>,
}

impl RuleIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, candidate: String) -> String {
        if self.used.insert(candidate.clone()) {
            return candidate;
        }
        let mut suffix = 2;
        loop {
            let next = format!("{}_{}", candidate, suffix);
            if self.used.insert(next.clone()) {
                return next;
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authored_ids_kept() {
        let rule = Rule::force("rule-1", json!(true));
        assert_eq!(normalize_rule_id("fr_", "f", &rule), "rule-1");
    }

    #[test]
    fn test_generated_ids_are_stable_and_content_based() {
        let a = Rule::force("", json!(true));
        let b = Rule::force("", json!(false));
        let first = normalize_rule_id("fr_", "f", &a);
        assert!(first.starts_with("fr_"));
        assert_eq!(first, normalize_rule_id("fr_", "f", &a));
        assert_ne!(first, normalize_rule_id("fr_", "f", &b));
    }

    #[test]
    fn test_allocator_dedupes() {
        let mut ids = RuleIdAllocator::new();
        assert_eq!(ids.allocate("r".into()), "r");
        assert_eq!(ids.allocate("r".into()), "r_2");
        assert_eq!(ids.allocate("r".into()), "r_3");
        assert_eq!(ids.allocate("r_2".into()), "r_2_2");
    }
}
