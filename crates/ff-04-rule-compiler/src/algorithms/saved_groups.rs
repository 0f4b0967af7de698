//! Saved-group expansion
//!
//! List groups become `{attr: {"$inGroup": id}}`, or `{attr: {"$in": [...]}}`
//! when inlined. Condition groups are always inlined. The targeting's match
//! type maps to `$or` (any), `$and` (all) or `$nor` (none).

use ff_01_targeting::validate;
use serde_json::{json, Map, Value};
use shared_types::{
    ConfigurationError, SavedGroup, SavedGroupId, SavedGroupKind, SavedGroupMatch,
    SavedGroupTargeting,
};
use std::collections::{BTreeMap, BTreeSet};

/// Clauses produced for one rule's saved-group targeting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedGroups {
    pub clauses: Vec<Value>,
    /// List groups left as `$inGroup` references
    pub referenced: BTreeSet<SavedGroupId>,
}

fn group_clause(group: &SavedGroup, inline: bool, rule_id: &str) -> Result<(Value, bool), ConfigurationError> {
    match &group.kind {
        SavedGroupKind::List {
            attribute_key,
            values,
        } => {
            let operator = if inline {
                json!({ "$in": values })
            } else {
                json!({ "$inGroup": group.id })
            };
            let mut clause = Map::new();
            clause.insert(attribute_key.clone(), operator);
            Ok((Value::Object(clause), !inline))
        }
        SavedGroupKind::Condition { condition } => {
            validate(condition).map_err(|e| ConfigurationError::MalformedCondition {
                rule_id: rule_id.to_string(),
                reason: format!("saved group {}: {}", group.id, e),
            })?;
            Ok((condition.clone(), false))
        }
    }
}

pub fn expand_saved_groups(
    rule_id: &str,
    targeting: &[SavedGroupTargeting],
    groups: &BTreeMap<SavedGroupId, SavedGroup>,
    inline: bool,
) -> Result<ExpandedGroups, ConfigurationError> {
    let mut expanded = ExpandedGroups::default();

    for entry in targeting {
        if entry.ids.is_empty() {
            return Err(ConfigurationError::EmptySavedGroupReference {
                rule_id: rule_id.to_string(),
            });
        }

        let mut clauses = Vec::with_capacity(entry.ids.len());
        for id in &entry.ids {
            let group = groups
                .get(id)
                .ok_or_else(|| ConfigurationError::UnknownSavedGroup {
                    rule_id: rule_id.to_string(),
                    group_id: id.clone(),
                })?;
            let (clause, referenced) = group_clause(group, inline, rule_id)?;
            if referenced {
                expanded.referenced.insert(group.id.clone());
            }
            clauses.push(clause);
        }

        let combined = match entry.match_type {
            SavedGroupMatch::Any => json!({ "$or": clauses }),
            SavedGroupMatch::All => json!({ "$and": clauses }),
            SavedGroupMatch::None => json!({ "$nor": clauses }),
        };
        expanded.clauses.push(combined);
    }

    Ok(expanded)
}

/// Rewrite `$inGroup`/`$notInGroup` references into `$in`/`$nin` lists.
///
/// Unknown groups become empty lists, which never match `$in`.
pub fn inline_group_references(condition: &Value, groups: &BTreeMap<SavedGroupId, Vec<String>>) -> Value {
    match condition {
        Value::Object(map) => {
            let mut rewritten = Map::with_capacity(map.len());
            for (key, value) in map {
                let replacement = match (key.as_str(), value.as_str()) {
                    ("$inGroup", Some(id)) => Some(("$in", id)),
                    ("$notInGroup", Some(id)) => Some(("$nin", id)),
                    _ => None,
                };
                match replacement {
                    Some((operator, id)) => {
                        let values = groups.get(id).cloned().unwrap_or_default();
                        rewritten.insert(operator.to_string(), json!(values));
                    }
                    None => {
                        rewritten.insert(key.clone(), inline_group_references(value, groups));
                    }
                }
            }
            Value::Object(rewritten)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| inline_group_references(item, groups))
                .collect(),
        ),
        other => other.clone(),
    }
}
