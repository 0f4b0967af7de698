//! Condition evaluation
//!
//! A condition is a JSON object whose keys are attribute paths (`"country"`,
//! `"company.plan"`) or logical operators (`$and`, `$or`, `$nor`, `$not`).
//! Attribute values are either literals (deep equality) or operator objects
//! such as `{"$gte": 18, "$lt": 65}`.
//!
//! A missing attribute reads as `null`.

use crate::domain::operators::{is_operator_object, Operator};
use crate::patterns;
use crate::version::padded_version;
use serde_json::Value;
use shared_types::{Attributes, EvaluationWarning, SavedGroupId};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Resolved members of list saved groups, keyed by group id.
pub type SavedGroupValues = BTreeMap<SavedGroupId, Vec<String>>;

static NULL: Value = Value::Null;

/// Result of a traced evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub matched: bool,
    pub warnings: Vec<EvaluationWarning>,
}

/// Evaluate `condition` against `attributes`.
pub fn evaluate(condition: &Value, attributes: &Attributes) -> bool {
    evaluate_traced(condition, attributes, None).matched
}

/// Evaluate with saved-group membership available to `$inGroup`/`$notInGroup`.
pub fn evaluate_with_groups(
    condition: &Value,
    attributes: &Attributes,
    saved_groups: &SavedGroupValues,
) -> bool {
    evaluate_traced(condition, attributes, Some(saved_groups)).matched
}

/// Evaluate and return every warning raised along the way.
pub fn evaluate_traced(
    condition: &Value,
    attributes: &Attributes,
    saved_groups: Option<&SavedGroupValues>,
) -> Evaluation {
    let root = Value::Object(attributes.clone());
    evaluate_value_traced(condition, &root, saved_groups)
}

/// Same as [`evaluate_traced`] for an arbitrary JSON document, e.g. the
/// `{"value": ...}` wrapper used by prerequisite conditions.
pub fn evaluate_value_traced(
    condition: &Value,
    document: &Value,
    saved_groups: Option<&SavedGroupValues>,
) -> Evaluation {
    let mut evaluator = ConditionEvaluator {
        saved_groups,
        warnings: Vec::new(),
    };
    let matched = evaluator.eval_condition(document, condition);
    for warning in &evaluator.warnings {
        debug!(warning = %warning, "Condition evaluation warning");
    }
    Evaluation {
        matched,
        warnings: evaluator.warnings,
    }
}

/// Read a dotted path out of a JSON document.
pub fn get_path<'v>(document: &'v Value, path: &str) -> &'v Value {
    let mut current = document;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}

struct ConditionEvaluator<'a> {
    saved_groups: Option<&'a SavedGroupValues>,
    warnings: Vec<EvaluationWarning>,
}

impl<'a> ConditionEvaluator<'a> {
    fn warn_operand(&mut self, operator: &str) -> bool {
        self.warnings.push(EvaluationWarning::InvalidOperand {
            operator: operator.to_string(),
        });
        false
    }

    fn eval_condition(&mut self, document: &Value, condition: &Value) -> bool {
        let Some(clauses) = condition.as_object() else {
            return self.warn_operand("condition");
        };

        for (key, expected) in clauses {
            let passed = match key.as_str() {
                "$or" => match self.eval_any(document, expected, "$or") {
                    Some(any) => any,
                    None => return false,
                },
                "$nor" => match self.eval_any(document, expected, "$nor") {
                    Some(any) => !any,
                    None => return false,
                },
                "$and" => self.eval_all(document, expected),
                "$not" => !self.eval_condition(document, expected),
                other if other.starts_with('$') => {
                    self.warnings.push(EvaluationWarning::UnknownOperator {
                        operator: other.to_string(),
                    });
                    false
                }
                path => self.eval_condition_value(expected, get_path(document, path)),
            };
            if !passed {
                return false;
            }
        }
        true
    }

    /// `None` when the operand is not an array.
    fn eval_any(&mut self, document: &Value, conditions: &Value, operator: &str) -> Option<bool> {
        let Some(list) = conditions.as_array() else {
            self.warn_operand(operator);
            return None;
        };
        if list.is_empty() {
            return Some(true);
        }
        Some(list.iter().any(|c| self.eval_condition(document, c)))
    }

    fn eval_all(&mut self, document: &Value, conditions: &Value) -> bool {
        let Some(list) = conditions.as_array() else {
            return self.warn_operand("$and");
        };
        list.iter().all(|c| self.eval_condition(document, c))
    }

    fn eval_condition_value(&mut self, expected: &Value, actual: &Value) -> bool {
        if !is_operator_object(expected) {
            return actual == expected;
        }
        let Some(operators) = expected.as_object() else {
            return false;
        };
        operators
            .iter()
            .all(|(token, operand)| self.eval_operator(token, actual, operand))
    }

    fn eval_operator(&mut self, token: &str, actual: &Value, expected: &Value) -> bool {
        let Some(operator) = Operator::parse(token) else {
            self.warnings.push(EvaluationWarning::UnknownOperator {
                operator: token.to_string(),
            });
            return false;
        };

        match operator {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => match expected.as_array() {
                Some(list) => is_in(actual, list),
                None => self.warn_operand(token),
            },
            Operator::Nin => match expected.as_array() {
                Some(list) => !is_in(actual, list),
                None => self.warn_operand(token),
            },
            Operator::All => {
                let (Some(values), Some(required)) = (actual.as_array(), expected.as_array())
                else {
                    return false;
                };
                required
                    .iter()
                    .all(|r| values.iter().any(|v| self.eval_condition_value(r, v)))
            }
            Operator::Size => match actual.as_array() {
                Some(values) => self.eval_condition_value(expected, &Value::from(values.len())),
                None => false,
            },
            Operator::ElemMatch => {
                let Some(values) = actual.as_array() else {
                    return false;
                };
                values.iter().any(|element| {
                    if is_operator_object(expected) {
                        self.eval_condition_value(expected, element)
                    } else {
                        self.eval_condition(element, expected)
                    }
                })
            }
            Operator::Exists => match expected.as_bool() {
                Some(should_exist) => !actual.is_null() == should_exist,
                None => self.warn_operand(token),
            },
            Operator::Type => match expected.as_str() {
                Some(type_name) => json_type(actual) == type_name,
                None => self.warn_operand(token),
            },
            Operator::Regex => {
                let Some(pattern) = expected.as_str() else {
                    return self.warn_operand(token);
                };
                match patterns::compiled(pattern) {
                    Some(regex) => actual.as_str().map_or(false, |s| regex.is_match(s)),
                    None => {
                        self.warnings.push(EvaluationWarning::InvalidRegex {
                            pattern: pattern.to_string(),
                        });
                        false
                    }
                }
            }
            Operator::Not => !self.eval_condition_value(expected, actual),
            op if op.is_version() => {
                let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) else {
                    return false;
                };
                let ordering = padded_version(a).cmp(&padded_version(b));
                match op {
                    Operator::VersionEq => ordering == Ordering::Equal,
                    Operator::VersionNe => ordering != Ordering::Equal,
                    Operator::VersionGt => ordering == Ordering::Greater,
                    Operator::VersionGte => ordering != Ordering::Less,
                    Operator::VersionLt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
            Operator::InGroup | Operator::NotInGroup => {
                let Some(group_id) = expected.as_str() else {
                    return self.warn_operand(token);
                };
                let Some(members) = self.saved_groups.and_then(|g| g.get(group_id)) else {
                    self.warnings.push(EvaluationWarning::UnknownSavedGroup {
                        group_id: group_id.to_string(),
                    });
                    return false;
                };
                let member = member_key(actual).map_or(false, |key| members.contains(&key));
                if operator == Operator::InGroup {
                    member
                } else {
                    !member
                }
            }
            // Logical operators are only valid at clause level.
            _ => self.warn_operand(token),
        }
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn is_in(actual: &Value, list: &[Value]) -> bool {
    match actual {
        Value::Array(values) => values.iter().any(|v| list.contains(v)),
        other => list.contains(other),
    }
}

fn member_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
