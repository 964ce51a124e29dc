// SPDX-License-Identifier: MIT

//! Read-only name lookup table for condition evaluation

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Variables visible to a condition, plus the attribute names that may be
/// read from mapping values with dot syntax
///
/// A context is built once per run and shared by every rule; it offers no
/// way to change a binding after construction.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    vars: HashMap<String, Value>,
    attributes: BTreeSet<String>,
}

impl EvaluationContext {
    /// Create a context from variable bindings and an attribute whitelist
    pub fn new<I, S>(vars: HashMap<String, Value>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a context from a JSON object, with no readable attributes
    pub fn from_json(object: Map<String, Value>) -> Self {
        Self {
            vars: object.into_iter().collect(),
            attributes: BTreeSet::new(),
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Whether `.name` may be read from a mapping value
    pub fn allows_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Convert the bindings to a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_context() {
        let ctx = EvaluationContext::default();
        assert!(ctx.get("anything").is_none());
        assert!(ctx.is_empty());
        assert!(!ctx.allows_attribute("city"));
    }

    #[test]
    fn test_from_json() {
        let obj = json!({"age": 21, "naics": "238220"});
        let ctx = EvaluationContext::from_json(obj.as_object().cloned().unwrap_or_default());

        assert_eq!(ctx.get("age"), Some(&json!(21)));
        assert!(ctx.contains("naics"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_attribute_whitelist() {
        let ctx = EvaluationContext::new(HashMap::new(), ["zip", "city"]);
        assert!(ctx.allows_attribute("city"));
        assert!(!ctx.allows_attribute("__class__"));
        assert!(ctx.allows_attribute("zip"));
    }

    #[test]
    fn test_to_json() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), json!(1));
        vars.insert("b".to_string(), json!("hello"));
        let ctx = EvaluationContext::new(vars, Vec::<String>::new());

        let json = ctx.to_json();
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"], "hello");
    }
}
