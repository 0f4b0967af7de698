//! Secure attribute hashing
//!
//! Values compared against a secure attribute are replaced by
//! `sha256(salt + value)`; SDKs hash the user's value the same way before
//! comparing. Saved groups referenced under a secure attribute have their
//! member lists hashed too.

use serde_json::Value;
use shared_crypto::hash_secure_value;
use shared_types::{PayloadContents, SavedGroupId};
use std::collections::BTreeSet;

/// Hash every comparison value of a secure attribute in `contents`.
pub fn hash_secure_attributes(contents: &mut PayloadContents, secure: &BTreeSet<String>, salt: &str) {
    if secure.is_empty() {
        return;
    }

    let mut groups = BTreeSet::new();
    for definition in contents.features.values_mut() {
        for rule in &mut definition.rules {
            if let Some(condition) = rule.condition.as_mut() {
                hash_condition(condition, secure, salt, &mut groups);
            }
        }
    }

    for id in groups {
        if let Some(values) = contents.saved_groups.get_mut(&id) {
            for value in values.iter_mut() {
                *value = hash_secure_value(salt, value);
            }
        }
    }
}

fn hash_condition(
    condition: &mut Value,
    secure: &BTreeSet<String>,
    salt: &str,
    groups: &mut BTreeSet<SavedGroupId>,
) {
    let Some(map) = condition.as_object_mut() else {
        return;
    };
    for (key, value) in map.iter_mut() {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                if let Some(items) = value.as_array_mut() {
                    for item in items {
                        hash_condition(item, secure, salt, groups);
                    }
                }
            }
            "$not" => hash_condition(value, secure, salt, groups),
            attribute if secure.contains(attribute) => hash_operand(value, salt, groups),
            _ => {}
        }
    }
}

fn hash_operand(operand: &mut Value, salt: &str, groups: &mut BTreeSet<SavedGroupId>) {
    match operand {
        Value::String(s) => *s = hash_secure_value(salt, s),
        Value::Array(items) => hash_strings(items, salt),
        Value::Object(operators) => {
            for (op, arg) in operators.iter_mut() {
                match op.as_str() {
                    "$eq" | "$ne" => {
                        if let Value::String(s) = arg {
                            *s = hash_secure_value(salt, s);
                        }
                    }
                    "$in" | "$nin" | "$all" => {
                        if let Value::Array(items) = arg {
                            hash_strings(items, salt);
                        }
                    }
                    "$inGroup" | "$notInGroup" => {
                        if let Some(id) = arg.as_str() {
                            groups.insert(id.to_string());
                        }
                    }
                    "$not" | "$elemMatch" => hash_operand(arg, salt, groups),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn hash_strings(items: &mut [Value], salt: &str) {
    for item in items {
        if let Value::String(s) = item {
            *s = hash_secure_value(salt, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{CompiledFeatureDefinition, ForceAction, ResolvedRule, RuleAction};

    fn contents_with(condition: Value) -> PayloadContents {
        let mut rule = ResolvedRule::new("r1", RuleAction::Force(ForceAction { value: json!(true) }));
        rule.condition = Some(condition);
        let mut contents = PayloadContents::default();
        contents.features.insert(
            "f".into(),
            CompiledFeatureDefinition {
                default_value: json!(false),
                rules: vec![rule],
                project: None,
            },
        );
        contents
            .saved_groups
            .insert("vip".into(), vec!["a@x.io".into()]);
        contents
    }

    fn secure() -> BTreeSet<String> {
        ["email".to_string()].into()
    }

    #[test]
    fn test_hashes_only_secure_attributes() {
        let mut contents = contents_with(json!({
            "email": {"$in": ["a@x.io", "b@x.io"]},
            "country": "US"
        }));
        hash_secure_attributes(&mut contents, &secure(), "salt");

        let condition = contents.features["f"].rules[0].condition.clone().unwrap();
        assert_eq!(condition["email"]["$in"][0], hash_secure_value("salt", "a@x.io"));
        assert_eq!(condition["country"], "US");
    }

    #[test]
    fn test_hashes_nested_and_direct_equality() {
        let mut contents = contents_with(json!({"$or": [{"email": "a@x.io"}, {"email": {"$ne": "z"}}]}));
        hash_secure_attributes(&mut contents, &secure(), "s");

        let condition = contents.features["f"].rules[0].condition.clone().unwrap();
        assert_eq!(condition["$or"][0]["email"], hash_secure_value("s", "a@x.io"));
        assert_eq!(condition["$or"][1]["email"]["$ne"], hash_secure_value("s", "z"));
    }

    #[test]
    fn test_hashes_referenced_group_members() {
        let mut contents = contents_with(json!({"email": {"$inGroup": "vip"}}));
        hash_secure_attributes(&mut contents, &secure(), "s");
        assert_eq!(contents.saved_groups["vip"], vec![hash_secure_value("s", "a@x.io")]);
    }

    #[test]
    fn test_no_secure_attributes_is_noop() {
        let original = contents_with(json!({"email": "a@x.io"}));
        let mut contents = original.clone();
        hash_secure_attributes(&mut contents, &BTreeSet::new(), "s");
        assert_eq!(contents, original);
    }
}
