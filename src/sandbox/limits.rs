// SPDX-License-Identifier: MIT

//! Evaluation budget

use super::error::RuntimeError;

pub const DEFAULT_MAX_COLLECTION_LEN: usize = 100_000;
pub const DEFAULT_MAX_DEPTH: usize = 100;
/// Hard ceiling on `max_depth`; parsing and evaluation recurse once per level
pub const MAX_DEPTH_CEILING: usize = 200;

/// Bounds applied while parsing and evaluating untrusted conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Largest string/list/mapping a built-in or operator may consume or produce
    pub max_collection_len: usize,
    /// Deepest syntactic nesting the parser accepts
    pub max_depth: usize,
}

impl EvalLimits {
    /// `max_depth` is clamped to `MAX_DEPTH_CEILING`
    pub fn new(max_collection_len: usize, max_depth: usize) -> Self {
        Self {
            max_collection_len,
            max_depth: max_depth.min(MAX_DEPTH_CEILING),
        }
    }

    /// Fail if a collection of `len` items is over budget
    pub fn check_len(&self, len: usize) -> Result<(), RuntimeError> {
        if len > self.max_collection_len {
            return Err(RuntimeError::BudgetExceeded {
                limit: self.max_collection_len,
                actual: len,
            });
        }
        Ok(())
    }
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COLLECTION_LEN, DEFAULT_MAX_DEPTH)
    }
}
