//! Hash attribute lookup

use ff_01_targeting::get_path;
use serde_json::Value;
use shared_types::Attributes;

/// The string a user is hashed on, with the attribute it came from.
///
/// Strings are used verbatim and numbers/booleans in their JSON form.
/// Missing or empty values fall through to `fallback`.
pub fn hash_value(
    attributes: &Attributes,
    attribute: &str,
    fallback: Option<&str>,
) -> Option<(String, String)> {
    let document = Value::Object(attributes.clone());
    std::iter::once(attribute)
        .chain(fallback)
        .find_map(|name| as_hash_string(get_path(&document, name)).map(|v| (name.to_string(), v)))
}

fn as_hash_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}
