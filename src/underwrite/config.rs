// SPDX-License-Identifier: MIT

//! Engine configuration from environment variables

use crate::sandbox::limits::{DEFAULT_MAX_COLLECTION_LEN, DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING};
use crate::sandbox::EvalLimits;
use crate::underwrite::error::UnderwriteError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const RULES_PATH_VAR: &str = "UW_RULES_PATH";
pub const RULES_DIR_VAR: &str = "UW_RULES_DIR";
pub const MAX_COLLECTION_LEN_VAR: &str = "UW_MAX_COLLECTION_LEN";
pub const MAX_DEPTH_VAR: &str = "UW_MAX_NESTING_DEPTH";
pub const PORT_VAR: &str = "UW_PORT";

const DEFAULT_RULES_PATH: &str = "rules/base.yaml";
const DEFAULT_RULES_DIR: &str = "rules";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Rule set used when none is named
    pub rules_path: PathBuf,
    /// Directory the server resolves rule set ids in
    pub rules_dir: PathBuf,
    pub limits: EvalLimits,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            rules_dir: PathBuf::from(DEFAULT_RULES_DIR),
            limits: EvalLimits::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl EngineConfig {
    /// Read the `UW_*` variables, falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, UnderwriteError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UnderwriteError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rules_path = lookup(RULES_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));
        let rules_dir = lookup(RULES_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_DIR));

        let max_collection_len = parse_var(&lookup, MAX_COLLECTION_LEN_VAR, DEFAULT_MAX_COLLECTION_LEN)?;
        let max_depth = parse_var(&lookup, MAX_DEPTH_VAR, DEFAULT_MAX_DEPTH)?;
        if max_depth > MAX_DEPTH_CEILING {
            return Err(UnderwriteError::config(format!(
                "{} = {}: must be at most {}",
                MAX_DEPTH_VAR, max_depth, MAX_DEPTH_CEILING
            )));
        }
        let port = parse_var(&lookup, PORT_VAR, DEFAULT_PORT)?;

        Ok(Self {
            rules_path,
            rules_dir,
            limits: EvalLimits::new(max_collection_len, max_depth),
            port,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, UnderwriteError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| UnderwriteError::config(format!("{} = {:?}: {}", key, raw, e))),
    }
}
