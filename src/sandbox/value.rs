// SPDX-License-Identifier: MIT

//! Dynamic value helpers
//!
//! Conditions operate directly on `serde_json::Value`. This module gives
//! those values the numeric view, truthiness, equality and ordering the
//! evaluator relies on.

use super::error::RuntimeError;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Name of a value's kind, used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Boolean coercion: empty, zero and null are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => match Num::from_number(n) {
            Num::Int(i) => i != 0,
            Num::Float(f) => f != 0.0,
        },
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Numeric view of a value; booleans count as 0 and 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn from_value(value: &Value) -> Option<Num> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Number(n) => Some(Num::from_number(n)),
            _ => None,
        }
    }

    fn from_number(n: &Number) -> Num {
        match n.as_i64() {
            Some(i) => Num::Int(i),
            // u64 beyond i64 range or a real float
            None => Num::Float(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }

    pub fn into_value(self) -> Result<Value, RuntimeError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or(RuntimeError::NonFiniteResult),
        }
    }

    fn cmp_num(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (Num::Int(a), Num::Float(b)) => cmp_int_float(a, b),
            (Num::Float(a), Num::Int(b)) => cmp_int_float(b, a).map(Ordering::reverse),
            (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
        }
    }
}

/// Exact comparison of an integer against a float; `i as f64` would round
/// integers above 2^53
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if f < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    // In range, so the cast is exact
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

/// Total number of items in a value at every depth
///
/// Strings count their bytes, scalars and empty containers count one as an
/// element. This is what a copy of the value costs against the collection
/// budget.
pub fn deep_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Array(items) => items
            .iter()
            .fold(0usize, |acc, item| acc.saturating_add(deep_len(item).max(1))),
        Value::Object(map) => map.iter().fold(0usize, |acc, (key, item)| {
            acc.saturating_add(key.len().saturating_add(deep_len(item)).max(1))
        }),
        _ => 1,
    }
}

/// Total equality: values of different kinds are simply unequal
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) {
        return a.cmp_num(b) == Some(Ordering::Equal);
    }
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => false,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`; incompatible kinds are an error
pub fn compare_values(op: &str, left: &Value, right: &Value) -> Result<Ordering, RuntimeError> {
    let incomparable = || RuntimeError::incomparable(op, type_name(left), type_name(right));

    if let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) {
        return a.cmp_num(b).ok_or_else(incomparable);
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !values_equal(x, y) {
                    return compare_values(op, x, y);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(incomparable()),
    }
}
