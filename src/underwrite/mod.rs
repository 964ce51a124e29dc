// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod rules;
pub mod server;

pub use config::EngineConfig;
pub use error::{RuleSetLoadError, UnderwriteError};
