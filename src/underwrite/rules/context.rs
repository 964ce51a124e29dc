// SPDX-License-Identifier: MIT

//! Evaluation context construction from an applicant payload

use crate::sandbox::EvaluationContext;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Address fields copied to the top level of the context
pub const FLATTENED_ADDRESS_KEYS: [&str; 3] = ["city", "state", "zip"];

/// Field names rule authors may read with dot syntax: the address fields,
/// and the fields of a loss-run entry
static APPLICANT_ATTRIBUTES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut names = FLATTENED_ADDRESS_KEYS.to_vec();
    names.extend(["date", "paid", "reserve"]);
    names
});

/// Build the lookup table for one evaluation run
///
/// Every top-level payload field is copied unchanged, then `city`, `state`
/// and `zip` are lifted out of `address` (null when absent). The nested
/// `address` stays in place alongside the flattened keys.
pub fn build_context(payload: &Value) -> EvaluationContext {
    let mut vars: HashMap<String, Value> = match payload {
        Value::Object(fields) => fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Null => HashMap::new(),
        other => {
            log::warn!(
                "Applicant payload is not a mapping ({}); evaluating against an empty record",
                crate::sandbox::value::type_name(other)
            );
            HashMap::new()
        }
    };

    let address = payload.get("address").and_then(Value::as_object);
    for key in FLATTENED_ADDRESS_KEYS {
        let value = address
            .and_then(|addr| addr.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        vars.insert(key.to_string(), value);
    }

    EvaluationContext::new(vars, APPLICANT_ATTRIBUTES.iter().copied())
}
