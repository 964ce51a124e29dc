// SPDX-License-Identifier: MIT

//! Whitelisted built-in functions
//!
//! These are the only callables a condition can reach. Each is a pure
//! function of its already-evaluated arguments.

use super::ast::Function;
use crate::sandbox::error::RuntimeError;
use crate::sandbox::limits::EvalLimits;
use crate::sandbox::value::{compare_values, type_name};
use serde_json::Value;
use std::cmp::Ordering;

/// Apply a built-in to evaluated arguments
pub fn call(function: Function, args: Vec<Value>, limits: &EvalLimits) -> Result<Value, RuntimeError> {
    match function {
        Function::Max => extreme(function, args, Ordering::Greater, limits),
        Function::Min => extreme(function, args, Ordering::Less, limits),
        Function::Len => len(args, limits),
    }
}

/// `max`/`min`: one iterable argument, or two or more values
fn extreme(
    function: Function,
    mut args: Vec<Value>,
    wanted: Ordering,
    limits: &EvalLimits,
) -> Result<Value, RuntimeError> {
    let name = function.name();
    let candidates = match args.len() {
        0 => {
            return Err(RuntimeError::invalid_argument(
                name,
                "expected at least 1 argument, got 0",
            ))
        }
        1 => iterate(name, args.remove(0), limits)?,
        _ => args,
    };

    let op = if wanted == Ordering::Greater { ">" } else { "<" };
    let mut items = candidates.into_iter();
    let mut best = items
        .next()
        .ok_or_else(|| RuntimeError::invalid_argument(name, "arg is an empty sequence"))?;
    for item in items {
        // Ties keep the first occurrence
        if compare_values(op, &item, &best)? == wanted {
            best = item;
        }
    }
    Ok(best)
}

fn iterate(function: &str, value: Value, limits: &EvalLimits) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::Array(items) => {
            limits.check_len(items.len())?;
            Ok(items)
        }
        Value::String(s) => {
            limits.check_len(s.len())?;
            Ok(s.chars().map(|c| Value::String(c.to_string())).collect())
        }
        Value::Object(map) => {
            limits.check_len(map.len())?;
            Ok(map.into_iter().map(|(k, _)| Value::String(k)).collect())
        }
        other => Err(RuntimeError::invalid_argument(
            function,
            format!("'{}' object is not iterable", type_name(&other)),
        )),
    }
}

fn len(args: Vec<Value>, limits: &EvalLimits) -> Result<Value, RuntimeError> {
    let [value] = <[Value; 1]>::try_from(args).map_err(|args| {
        RuntimeError::invalid_argument(
            "len",
            format!("takes exactly one argument ({} given)", args.len()),
        )
    })?;

    let count = match &value {
        Value::String(s) => {
            limits.check_len(s.len())?;
            s.chars().count()
        }
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(RuntimeError::invalid_argument(
                "len",
                format!("object of type '{}' has no len()", type_name(other)),
            ))
        }
    };
    limits.check_len(count)?;
    Ok(Value::from(count as u64))
}
