// SPDX-License-Identifier: MIT

//! Typed error handling for underwrite-rs
//!
//! Inside a rule run, condition failures never appear here: they are local
//! to one rule and end up in that rule's result. These errors abort a whole
//! run, or a single `eval` invocation from the command line.

use crate::sandbox::SandboxError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for underwrite-rs
#[derive(Debug, Error)]
pub enum UnderwriteError {
    /// The ruleset could not be loaded; no report is produced
    #[error("Rule set error: {0}")]
    RuleSetLoad(#[from] RuleSetLoadError),

    /// Configuration errors (invalid env vars, bad flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A standalone condition failed to parse or evaluate
    #[error("Condition error: {0}")]
    Condition(#[from] SandboxError),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Ruleset loading errors; always fatal to the run
#[derive(Debug, Error)]
pub enum RuleSetLoadError {
    /// File not found when loading a ruleset
    #[error("Rule set file not found: {0}")]
    NotFound(PathBuf),

    /// The source exists but could not be read
    #[error("Failed to read rule set {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed document or missing required rule fields
    #[error("Invalid rule set: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two rules share an id
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),
}

impl UnderwriteError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_wraps_into_top_level() {
        let err: UnderwriteError = RuleSetLoadError::DuplicateRuleId("R1".to_string()).into();
        assert_eq!(err.to_string(), "Rule set error: Duplicate rule id: R1");
    }

    #[test]
    fn test_not_found_message() {
        let err = RuleSetLoadError::NotFound(PathBuf::from("rules/missing.yaml"));
        assert_eq!(err.to_string(), "Rule set file not found: rules/missing.yaml");
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(
            UnderwriteError::config("bad port"),
            UnderwriteError::Config(_)
        ));
        let err = UnderwriteError::other("boom");
        assert!(matches!(err, UnderwriteError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_conversions() {
        let err: UnderwriteError = SandboxError::UnknownVariable("age".to_string()).into();
        assert!(matches!(err, UnderwriteError::Condition(_)));
        assert_eq!(err.to_string(), "Condition error: Unknown name: age");

        let err: UnderwriteError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, UnderwriteError::Io(_)));
        assert_eq!(err.to_string(), "gone");

        let err: UnderwriteError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, UnderwriteError::Json(_)));
    }
}
