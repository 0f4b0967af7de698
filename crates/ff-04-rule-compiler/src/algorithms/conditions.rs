//! Condition helpers

use serde_json::Value;

/// True for `None`, `{}` and anything that is not an object.
pub fn is_empty_condition(condition: Option<&Value>) -> bool {
    condition.map_or(true, |c| c.as_object().map_or(true, |o| o.is_empty()))
}

/// Join clauses with `$and`, collapsing the trivial cases.
pub fn combine_conditions(mut clauses: Vec<Value>) -> Option<Value> {
    clauses.retain(|c| !is_empty_condition(Some(c)));
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(serde_json::json!({ "$and": clauses })),
    }
}
