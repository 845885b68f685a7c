//! Scalar operator semantics and the row-combination rule.
//!
//! Null operands propagate through arithmetic and comparisons; boolean
//! connectives follow three-valued (Kleene) logic.

use regex::Regex;
use std::cmp::Ordering;

use super::value::{Value, ValueEntry, ValueList};
use crate::aom::{ArchetypeTerminology, CPrimitiveObject, is_value_set_code};
use crate::error::EvaluationError;
use crate::rules::{BinaryOperator, UnaryOperator};

/// Pairs rows of two operands: equal counts zip, a single row broadcasts
/// over the other side, and an empty operand counts as one null row.
pub fn combine_rows<F>(
    operator: &str,
    left: &ValueList,
    right: &ValueList,
    mut combine: F,
) -> Result<ValueList, EvaluationError>
where
    F: FnMut(&ValueEntry, &ValueEntry) -> Result<ValueEntry, EvaluationError>,
{
    let null = ValueList::null();
    let left = if left.is_empty() { &null } else { left };
    let right = if right.is_empty() { &null } else { right };

    let pairs: Vec<(&ValueEntry, &ValueEntry)> = match (left.len(), right.len()) {
        (l, r) if l == r => left.iter().zip(right.iter()).collect(),
        (1, _) => right.iter().map(|row| (&left.entries()[0], row)).collect(),
        (_, 1) => left.iter().map(|row| (row, &right.entries()[0])).collect(),
        (l, r) => {
            return Err(EvaluationError::ArityMismatch {
                operator: operator.to_string(),
                left: l,
                right: r,
            });
        }
    };

    pairs
        .into_iter()
        .map(|(left_row, right_row)| combine(left_row, right_row))
        .collect()
}

pub fn apply_unary(operator: UnaryOperator, value: &Value) -> Result<Value, EvaluationError> {
    match (operator, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Boolean(flag)) => Ok(Value::Boolean(!flag)),
        (UnaryOperator::Negate, Value::Integer(integer)) => integer
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EvaluationError::invalid_operation("integer overflow in negation")),
        (UnaryOperator::Negate, Value::Real(real)) => Ok(Value::Real(-real)),
        (UnaryOperator::Not, other) => Err(EvaluationError::NotBoolean {
            actual: other.type_name().to_string(),
        }),
        (UnaryOperator::Negate, other) => Err(EvaluationError::type_mismatch(
            "-",
            other.type_name(),
            "number",
        )),
    }
}

/// Applies every operator except `matches`, which needs the archetype terminology.
pub fn apply_binary(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, EvaluationError> {
    if operator.is_boolean() {
        return apply_logical(operator, left, right);
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match operator {
        BinaryOperator::Equal => values_equal(operator, left, right).map(Value::Boolean),
        BinaryOperator::NotEqual => values_equal(operator, left, right).map(|eq| Value::Boolean(!eq)),
        BinaryOperator::Less
        | BinaryOperator::LessOrEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterOrEqual => {
            let ordering = compare(operator, left, right)?;
            Ok(Value::Boolean(match operator {
                BinaryOperator::Less => ordering == Ordering::Less,
                BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
                BinaryOperator::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => apply_arithmetic(operator, left, right),
    }
}

fn mismatch(operator: BinaryOperator, left: &Value, right: &Value) -> EvaluationError {
    EvaluationError::type_mismatch(operator.symbol(), left.type_name(), right.type_name())
}

fn apply_logical(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, EvaluationError> {
    let as_truth = |value: &Value| -> Result<Option<bool>, EvaluationError> {
        match value {
            Value::Null => Ok(None),
            Value::Boolean(flag) => Ok(Some(*flag)),
            _ => Err(mismatch(operator, left, right)),
        }
    };
    let (a, b) = (as_truth(left)?, as_truth(right)?);

    let result = match operator {
        BinaryOperator::And => match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOperator::Or => match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        BinaryOperator::Xor => match (a, b) {
            (Some(x), Some(y)) => Some(x != y),
            _ => None,
        },
        _ => match (a, b) {
            (Some(false), _) => Some(true),
            (_, Some(true)) => Some(true),
            (Some(true), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map(Value::Boolean).unwrap_or(Value::Null))
}

fn values_equal(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<bool, EvaluationError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            Ok(left.as_f64() == right.as_f64())
        }
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (
            Value::TerminologyCode {
                terminology_id: left_terminology,
                code_string: left_code,
            },
            Value::TerminologyCode {
                terminology_id: right_terminology,
                code_string: right_code,
            },
        ) => Ok(left_code == right_code
            && match (left_terminology, right_terminology) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }),
        (Value::TerminologyCode { code_string, .. }, Value::String(text))
        | (Value::String(text), Value::TerminologyCode { code_string, .. }) => {
            Ok(code_string == text)
        }
        _ => Err(mismatch(operator, left, right)),
    }
}

fn compare(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Ordering, EvaluationError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            let (a, b) = (left.as_f64().unwrap_or(f64::NAN), right.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b).ok_or_else(|| {
                EvaluationError::invalid_operation(format!("cannot order {a} and {b}"))
            })
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(operator, left, right)),
    }
}

fn apply_arithmetic(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, EvaluationError> {
    let overflow = || EvaluationError::invalid_operation(format!("integer overflow in '{operator}'"));
    match (left, right) {
        (Value::String(a), Value::String(b)) if operator == BinaryOperator::Plus => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (Value::Integer(a), Value::Integer(b)) => match operator {
            BinaryOperator::Plus => a.checked_add(*b).map(Value::Integer).ok_or_else(overflow),
            BinaryOperator::Minus => a.checked_sub(*b).map(Value::Integer).ok_or_else(overflow),
            BinaryOperator::Multiply => a.checked_mul(*b).map(Value::Integer).ok_or_else(overflow),
            BinaryOperator::Divide => divide(*a as f64, *b as f64),
            BinaryOperator::Modulo => {
                if *b == 0 {
                    Err(EvaluationError::invalid_operation("modulo by zero"))
                } else {
                    Ok(Value::Integer(a % b))
                }
            }
            _ => match u32::try_from(*b) {
                Ok(exponent) => a.checked_pow(exponent).map(Value::Integer).ok_or_else(overflow),
                Err(_) => Ok(Value::Real((*a as f64).powf(*b as f64))),
            },
        },
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            let a = left.as_f64().unwrap_or(f64::NAN);
            let b = right.as_f64().unwrap_or(f64::NAN);
            match operator {
                BinaryOperator::Plus => Ok(Value::Real(a + b)),
                BinaryOperator::Minus => Ok(Value::Real(a - b)),
                BinaryOperator::Multiply => Ok(Value::Real(a * b)),
                BinaryOperator::Divide => divide(a, b),
                BinaryOperator::Modulo => {
                    if b == 0.0 {
                        Err(EvaluationError::invalid_operation("modulo by zero"))
                    } else {
                        Ok(Value::Real(a % b))
                    }
                }
                _ => Ok(Value::Real(a.powf(b))),
            }
        }
        _ => Err(mismatch(operator, left, right)),
    }
}

fn divide(a: f64, b: f64) -> Result<Value, EvaluationError> {
    if b == 0.0 {
        Err(EvaluationError::invalid_operation("division by zero"))
    } else {
        Ok(Value::Real(a / b))
    }
}

/// `value matches {constraint}`. Value-set codes are looked up in `terminology`.
pub fn apply_matches(
    value: &Value,
    constraint: &CPrimitiveObject,
    terminology: &ArchetypeTerminology,
) -> Result<Value, EvaluationError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let type_error = || {
        EvaluationError::type_mismatch("matches", value.type_name(), constraint.rm_type_name())
    };

    let matched = match constraint {
        CPrimitiveObject::Integer(intervals) => match value {
            Value::Integer(integer) => intervals.iter().any(|interval| interval.has(*integer)),
            Value::Real(real) if real.fract() == 0.0 => {
                intervals.iter().any(|interval| interval.has(*real as i64))
            }
            _ => return Err(type_error()),
        },
        CPrimitiveObject::Real(intervals) => {
            let number = value.as_f64().ok_or_else(type_error)?;
            intervals.iter().any(|interval| interval.has(number))
        }
        CPrimitiveObject::Boolean(allowed) => {
            let flag = value.as_bool().ok_or_else(type_error)?;
            allowed.contains(&flag)
        }
        CPrimitiveObject::String(patterns) => {
            let Value::String(text) = value else {
                return Err(type_error());
            };
            let mut matched = false;
            for pattern in patterns {
                if pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/') {
                    let regex = Regex::new(&format!("^(?:{})$", &pattern[1..pattern.len() - 1]))
                        .map_err(|error| {
                            EvaluationError::invalid_operation(format!(
                                "invalid pattern {pattern}: {error}"
                            ))
                        })?;
                    if regex.is_match(text) {
                        matched = true;
                        break;
                    }
                } else if pattern == text {
                    matched = true;
                    break;
                }
            }
            matched
        }
        CPrimitiveObject::TerminologyCode(code) => {
            let actual = value.as_code().ok_or_else(type_error)?;
            if is_value_set_code(code) {
                let members = terminology
                    .value_set(code)
                    .ok_or_else(|| EvaluationError::UnknownValueSet { code: code.clone() })?;
                members.iter().any(|member| member == actual)
            } else {
                actual == code
            }
        }
    };
    Ok(Value::Boolean(matched))
}
