// SPDX-License-Identifier: MIT

pub mod context;
pub mod loader;
pub mod report;
pub mod runner;
pub mod types;

pub use context::build_context;
pub use loader::{InlineRules, RuleLoader, RuleSource};
pub use report::{EvaluationReport, RuleResult, Summary};
pub use runner::RuleRunner;
pub use types::{RuleDefinition, RuleSet};
