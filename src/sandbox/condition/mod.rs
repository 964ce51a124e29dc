// SPDX-License-Identifier: MIT

//! Rule condition language
//!
//! This module provides parsing and evaluation of rule conditions.
//! Conditions are single expressions like:
//! - `age >= 18`
//! - `1 < years_in_business <= 40`
//! - `state != 'FL' and len(loss_runs_36mo) < 3`
//! - `max(requested_limits['gl'], 0) <= 2000000`

mod ast;
mod evaluator;
mod functions;
mod lexer;
mod parser;

pub use ast::{BinaryOp, BoolOp, CompareOp, Expression, Function, Literal, UnaryOp};
pub use evaluator::{evaluate, evaluate_with_limits};
pub use parser::{parse, parse_with_limits};
