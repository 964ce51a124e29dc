// SPDX-License-Identifier: MIT

//! Typed error handling for the condition sandbox
//!
//! Every failure a condition can produce, from lexing through evaluation,
//! is a `SandboxError`. None of them are fatal to a rule run: the runner
//! turns each one into a failed rule result.

use thiserror::Error;

/// Top-level error type for parsing and evaluating a condition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    /// Malformed input that is not even a recognizable construct
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// Identifier not present in the evaluation context
    #[error("Unknown name: {0}")]
    UnknownVariable(String),

    /// A construct outside the permitted grammar
    #[error("Disallowed expression: {0}")]
    DisallowedExpression(String),

    /// Call target outside the function whitelist
    #[error("Function calls are restricted: {0}")]
    RestrictedFunctionCall(String),

    /// Failure while evaluating a well-formed expression
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors raised while walking a valid expression tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    UnsupportedOperand {
        op: String,
        left: String,
        right: String,
    },

    #[error("bad operand type for unary {op}: '{operand}'")]
    BadOperand { op: String, operand: String },

    #[error("'{op}' not supported between instances of '{left}' and '{right}'")]
    IncomparableTypes {
        op: String,
        left: String,
        right: String,
    },

    #[error("'{0}' object is not subscriptable")]
    NotSubscriptable(String),

    #[error("indices must be integers, not '{0}'")]
    InvalidIndex(String),

    #[error("index out of range: {0}")]
    IndexOutOfRange(i64),

    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    #[error("'{kind}' object has no attribute '{name}'")]
    MissingAttribute { kind: String, name: String },

    #[error("{function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error("integer overflow")]
    NumericOverflow,

    #[error("numeric result is not finite")]
    NonFiniteResult,

    #[error("evaluation budget exceeded: collection of {actual} items (limit {limit})")]
    BudgetExceeded { limit: usize, actual: usize },

    #[error("mapping keys must be strings, not '{0}'")]
    InvalidMappingKey(String),
}

impl SandboxError {
    /// Create a syntax error at a character position
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a disallowed-construct error
    pub fn disallowed(construct: impl Into<String>) -> Self {
        Self::DisallowedExpression(construct.into())
    }

    /// Create a restricted-call error
    pub fn restricted_call(callee: impl Into<String>) -> Self {
        Self::RestrictedFunctionCall(callee.into())
    }
}

impl RuntimeError {
    pub fn unsupported(op: &str, left: &str, right: &str) -> Self {
        Self::UnsupportedOperand {
            op: op.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn incomparable(op: &str, left: &str, right: &str) -> Self {
        Self::IncomparableTypes {
            op: op.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_message() {
        let err = SandboxError::UnknownVariable("unknown_field".to_string());
        assert_eq!(err.to_string(), "Unknown name: unknown_field");
    }

    #[test]
    fn test_runtime_error_is_transparent() {
        let err: SandboxError = RuntimeError::DivisionByZero.into();
        assert_eq!(err.to_string(), "division by zero");
        assert!(matches!(
            err,
            SandboxError::Runtime(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn test_syntax_error_carries_position() {
        let err = SandboxError::syntax("unexpected character '$'", 4);
        assert_eq!(
            err.to_string(),
            "Syntax error at position 4: unexpected character '$'"
        );
    }
}
