//! Rule set loader - YAML/JSON loading and parsing
//!
//! This module handles loading rule sets from files and inline documents.
//! Any failure here is fatal to the run: there is no meaningful partial
//! rule set.

use super::types::RuleSet;
use crate::underwrite::error::RuleSetLoadError;
use std::fs;
use std::path::{Path, PathBuf};

/// Anything a rule set can be loaded from
pub trait RuleSource {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError>;
}

/// Loads rule sets from YAML (or JSON) documents
pub struct RuleLoader;

impl RuleLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a rule set from a file
    pub fn load_rules<P: AsRef<Path>>(&self, path: P) -> Result<RuleSet, RuleSetLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RuleSetLoadError::NotFound(path.to_path_buf())
            } else {
                RuleSetLoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let rule_set = Self::parse_yaml(&content)?;
        log::debug!(
            "Loaded rule set {} ({} rules) from {}",
            rule_set.version,
            rule_set.len(),
            path.display()
        );
        Ok(rule_set)
    }

    /// Parse a rule set from a YAML string; JSON is accepted as a YAML subset
    pub fn parse_yaml(content: &str) -> Result<RuleSet, RuleSetLoadError> {
        let rule_set: RuleSet = serde_yaml::from_str(content)?;
        rule_set.ensure_unique_ids()?;
        Ok(rule_set)
    }
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSource for Path {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError> {
        RuleLoader::new().load_rules(self)
    }
}

impl RuleSource for PathBuf {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError> {
        self.as_path().load_rule_set()
    }
}

/// A rule set document held in memory
#[derive(Debug, Clone)]
pub struct InlineRules(pub String);

impl RuleSource for InlineRules {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError> {
        RuleLoader::parse_yaml(&self.0)
    }
}

/// An already-loaded rule set is its own source
impl RuleSource for RuleSet {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError> {
        self.ensure_unique_ids()?;
        Ok(self.clone())
    }
}

impl<T: RuleSource + ?Sized> RuleSource for &T {
    fn load_rule_set(&self) -> Result<RuleSet, RuleSetLoadError> {
        (**self).load_rule_set()
    }
}
