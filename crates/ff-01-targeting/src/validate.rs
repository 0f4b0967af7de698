//! Structural validation of conditions
//!
//! `validate` rejects conditions that the evaluator would silently treat as
//! no-match: unknown operators, wrongly shaped operands and bad regexes.

use crate::domain::errors::ConditionError;
use crate::domain::operators::{is_operator_object, Operator};
use regex::Regex;
use serde_json::Value;

/// Check that `condition` is a well-formed targeting expression.
pub fn validate(condition: &Value) -> Result<(), ConditionError> {
    let Some(clauses) = condition.as_object() else {
        return Err(ConditionError::NotAnObject {
            found: type_label(condition).to_string(),
        });
    };

    for (key, value) in clauses {
        match key.as_str() {
            "$or" | "$nor" | "$and" => {
                let list = value.as_array().ok_or_else(|| operand(key, "an array"))?;
                for nested in list {
                    validate(nested)?;
                }
            }
            "$not" => validate(value)?,
            other if other.starts_with('$') => {
                return Err(ConditionError::UnknownOperator {
                    operator: other.to_string(),
                })
            }
            _ => validate_value(value)?,
        }
    }
    Ok(())
}

fn validate_value(expected: &Value) -> Result<(), ConditionError> {
    if !is_operator_object(expected) {
        return Ok(());
    }
    let Some(operators) = expected.as_object() else {
        return Ok(());
    };

    for (token, arg) in operators {
        let op = Operator::parse(token).ok_or_else(|| ConditionError::UnknownOperator {
            operator: token.clone(),
        })?;

        match op {
            Operator::In | Operator::Nin | Operator::All => {
                if !arg.is_array() {
                    return Err(operand(token, "an array"));
                }
            }
            Operator::Exists => {
                if !arg.is_boolean() {
                    return Err(operand(token, "a boolean"));
                }
            }
            Operator::Regex => {
                let pattern = arg.as_str().ok_or_else(|| operand(token, "a string"))?;
                Regex::new(pattern).map_err(|e| ConditionError::InvalidRegex {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            }
            Operator::Type | Operator::InGroup | Operator::NotInGroup => {
                if !arg.is_string() {
                    return Err(operand(token, "a string"));
                }
            }
            Operator::Size => {
                if !arg.is_number() && !is_operator_object(arg) {
                    return Err(operand(token, "a number or operator object"));
                }
                validate_value(arg)?;
            }
            Operator::ElemMatch => {
                if is_operator_object(arg) {
                    validate_value(arg)?;
                } else {
                    validate(arg)?;
                }
            }
            Operator::Not => validate_value(arg)?,
            op if op.is_version() => {
                if !arg.is_string() {
                    return Err(operand(token, "a version string"));
                }
            }
            op if op.is_logical() => return Err(operand(token, "clause position")),
            _ => {}
        }
    }
    Ok(())
}

fn operand(operator: &str, expected: &str) -> ConditionError {
    ConditionError::InvalidOperand {
        operator: operator.to_string(),
        expected: expected.to_string(),
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
