// SPDX-License-Identifier: MIT

//! Schema types for rule set documents
//!
//! A rule set is a human-authored YAML (or JSON) document:
//!
//! ```yaml
//! version: "1.0.0"
//! rules:
//!   - id: R1
//!     description: Applicant must be an adult
//!     severity: warn
//!     condition: age >= 18
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::underwrite::error::RuleSetLoadError;

pub const DEFAULT_VERSION: &str = "0.0.0";
pub const DEFAULT_SEVERITY: &str = "info";

/// A single business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique within its rule set
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Open vocabulary (info, warn, critical, ...); carried through untouched
    #[serde(default = "default_severity", deserialize_with = "severity_or_default")]
    pub severity: String,
    /// Expression in the condition language
    pub condition: String,
}

/// Versioned, ordered collection of rules; order defines result order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "default_version", deserialize_with = "version_string")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<RuleDefinition>,
}

impl RuleDefinition {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        severity: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity: severity.into(),
            condition: condition.into(),
        }
    }
}

impl RuleSet {
    pub fn new(version: impl Into<String>, rules: Vec<RuleDefinition>) -> Self {
        Self {
            version: version.into(),
            rules,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find a rule by id
    pub fn get(&self, id: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Reject rule sets where two rules share an id
    pub fn ensure_unique_ids(&self) -> Result<(), RuleSetLoadError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleSetLoadError::DuplicateRuleId(rule.id.clone()));
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION, Vec::new())
    }
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_severity() -> String {
    DEFAULT_SEVERITY.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn severity_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_severity))
}

/// Authors write `version: 1.2` as often as `version: "1.2.0"`
fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(default_version()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "version must be a string or number, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_defaults() {
        let yaml = r#"
id: R1
condition: age >= 18
"#;
        let rule: RuleDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.id, "R1");
        assert_eq!(rule.description, "");
        assert_eq!(rule.severity, "info");
        assert_eq!(rule.condition, "age >= 18");
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let yaml = r#"
id: R1
description: null
severity: ~
condition: "True"
"#;
        let rule: RuleDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.description, "");
        assert_eq!(rule.severity, "info");
    }

    #[test]
    fn test_open_severity_vocabulary() {
        let yaml = r#"
id: R9
severity: escalate-to-uw-manager
condition: "revenue_usd < 5000000"
"#;
        let rule: RuleDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.severity, "escalate-to-uw-manager");
    }

    #[test]
    fn test_missing_condition_is_error() {
        let yaml = "id: R1\nseverity: warn\n";
        assert!(serde_yaml::from_str::<RuleDefinition>(yaml).is_err());
    }

    #[test]
    fn test_version_forms() {
        let set: RuleSet = serde_yaml::from_str("version: \"1.0.0\"\nrules: []").unwrap();
        assert_eq!(set.version, "1.0.0");

        let set: RuleSet = serde_yaml::from_str("version: 2\nrules: []").unwrap();
        assert_eq!(set.version, "2");

        let set: RuleSet = serde_yaml::from_str("version: 1.5\nrules: []").unwrap();
        assert_eq!(set.version, "1.5");

        let set: RuleSet = serde_yaml::from_str("rules: []").unwrap();
        assert_eq!(set.version, "0.0.0");

        let set: RuleSet = serde_yaml::from_str("version: null").unwrap();
        assert_eq!(set.version, "0.0.0");
        assert!(set.is_empty());

        assert!(serde_yaml::from_str::<RuleSet>("version: [1, 2]").is_err());
    }

    #[test]
    fn test_rules_null_is_empty() {
        let set: RuleSet = serde_yaml::from_str("version: '1'\nrules:").unwrap();
        assert!(set.rules.is_empty());
    }

    #[test]
    fn test_unique_ids() {
        let set = RuleSet::new(
            "1",
            vec![
                RuleDefinition::new("R1", "", "info", "True"),
                RuleDefinition::new("R2", "", "info", "True"),
            ],
        );
        assert!(set.ensure_unique_ids().is_ok());
        assert_eq!(set.get("R2").map(|r| r.id.as_str()), Some("R2"));

        let dup = RuleSet::new(
            "1",
            vec![
                RuleDefinition::new("R1", "", "info", "True"),
                RuleDefinition::new("R1", "", "warn", "False"),
            ],
        );
        assert!(matches!(
            dup.ensure_unique_ids(),
            Err(RuleSetLoadError::DuplicateRuleId(id)) if id == "R1"
        ));
    }

    #[test]
    fn test_json_round_trip_shape() {
        let set = RuleSet::new("1.0.0", vec![RuleDefinition::new("R1", "adult", "warn", "age >= 18")]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["rules"][0]["condition"], "age >= 18");
    }
}
