// SPDX-License-Identifier: MIT

//! Sandboxed evaluation of business-rule conditions
//!
//! Only the productions in [`condition::Expression`] exist, only the
//! built-ins in [`condition::Function`] can be called, and attribute reads
//! are limited to the names the [`EvaluationContext`] whitelists.

pub mod condition;
pub mod context;
pub mod error;
pub mod limits;
pub mod value;

pub use context::EvaluationContext;
pub use error::{RuntimeError, SandboxError};
pub use limits::EvalLimits;

use condition::Expression;
use serde_json::Value;

/// Parses and evaluates conditions under a fixed evaluation budget
#[derive(Debug, Clone, Copy, Default)]
pub struct Sandbox {
    limits: EvalLimits,
}

impl Sandbox {
    pub fn new(limits: EvalLimits) -> Self {
        Self { limits }
    }

    /// Parse a condition without evaluating it
    pub fn parse(&self, expression: &str) -> Result<Expression, SandboxError> {
        condition::parse_with_limits(expression, &self.limits)
    }

    /// Evaluate an already-parsed condition
    pub fn evaluate_parsed(
        &self,
        expr: &Expression,
        ctx: &EvaluationContext,
    ) -> Result<Value, SandboxError> {
        condition::evaluate_with_limits(expr, ctx, &self.limits)
    }

    /// Parse and evaluate a condition against a context
    pub fn evaluate(&self, expression: &str, ctx: &EvaluationContext) -> Result<Value, SandboxError> {
        let expr = self.parse(expression)?;
        self.evaluate_parsed(&expr, ctx)
    }
}
