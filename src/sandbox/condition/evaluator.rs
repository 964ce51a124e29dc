//! Condition expression evaluator
//!
//! A pure walk over the closed AST: no I/O, no mutation of the context,
//! and every node kind handled by an exhaustive match.

use super::ast::{BinaryOp, BoolOp, CompareOp, Expression, Literal, UnaryOp};
use super::functions;
use crate::sandbox::context::EvaluationContext;
use crate::sandbox::error::{RuntimeError, SandboxError};
use crate::sandbox::limits::EvalLimits;
use crate::sandbox::value::{compare_values, deep_len, is_truthy, type_name, values_equal, Num};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Evaluate an expression against a context with default limits
pub fn evaluate(expr: &Expression, ctx: &EvaluationContext) -> Result<Value, SandboxError> {
    evaluate_with_limits(expr, ctx, &EvalLimits::default())
}

/// Evaluate an expression against a context
pub fn evaluate_with_limits(
    expr: &Expression,
    ctx: &EvaluationContext,
    limits: &EvalLimits,
) -> Result<Value, SandboxError> {
    Evaluator { ctx, limits }.eval(expr)
}

struct Evaluator<'a> {
    ctx: &'a EvaluationContext,
    limits: &'a EvalLimits,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expression) -> Result<Value, SandboxError> {
        match expr {
            Expression::Literal(lit) => Ok(literal_value(lit)?),
            Expression::List(items) | Expression::Tuple(items) => {
                self.limits.check_len(items.len())?;
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let list = Value::Array(values);
                self.limits.check_len(deep_len(&list))?;
                Ok(list)
            }
            Expression::Mapping(entries) => {
                self.limits.check_len(entries.len())?;
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::String(s) => s,
                        other => {
                            return Err(RuntimeError::InvalidMappingKey(
                                type_name(&other).to_string(),
                            )
                            .into())
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                let mapping = Value::Object(map);
                self.limits.check_len(deep_len(&mapping))?;
                Ok(mapping)
            }
            Expression::Variable(name) => self
                .ctx
                .get(name)
                .cloned()
                .ok_or_else(|| SandboxError::UnknownVariable(name.clone())),
            Expression::Subscript { value, index } => {
                let container = self.eval(value)?;
                let index = self.eval(index)?;
                Ok(subscript(container, &index)?)
            }
            Expression::Attribute { value, name } => {
                // Whitelist first: a forbidden name never reaches a value
                if !self.ctx.allows_attribute(name) {
                    return Err(SandboxError::disallowed(format!("attribute '.{}'", name)));
                }
                let target = self.eval(value)?;
                Ok(attribute(target, name)?)
            }
            Expression::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(unary(*op, &value)?)
            }
            Expression::Binary { op, .. } if *op != BinaryOp::Pow => self.binary_chain(expr),
            Expression::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right, self.limits)?)
            }
            Expression::Compare { left, chain } => self.compare_chain(left, chain),
            Expression::Bool { op, operands } => {
                // Every operand is evaluated, even once the outcome is known,
                // so an error in a later operand still surfaces
                let values = operands
                    .iter()
                    .map(|operand| self.eval(operand))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = match op {
                    BoolOp::And => values.iter().all(is_truthy),
                    BoolOp::Or => values.iter().any(is_truthy),
                };
                Ok(Value::Bool(result))
            }
            Expression::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(functions::call(*function, args, self.limits)?)
            }
        }
    }

    /// Left-associative operator chains are walked iteratively along their
    /// left spine, so a long flat sum costs no recursion
    fn binary_chain(&self, expr: &Expression) -> Result<Value, SandboxError> {
        let mut links = Vec::new();
        let mut node = expr;
        while let Expression::Binary { op, left, right } = node {
            if *op == BinaryOp::Pow {
                break;
            }
            links.push((*op, right.as_ref()));
            node = left;
        }
        let mut acc = self.eval(node)?;
        for (op, right) in links.into_iter().rev() {
            let right = self.eval(right)?;
            acc = binary(op, &acc, &right, self.limits)?;
        }
        Ok(acc)
    }

    /// Pairwise left to right; stops at the first false link without
    /// evaluating the remaining comparators
    fn compare_chain(
        &self,
        left: &Expression,
        chain: &[(CompareOp, Expression)],
    ) -> Result<Value, SandboxError> {
        let mut left = self.eval(left)?;
        for (op, comparator) in chain {
            let right = self.eval(comparator)?;
            if !compare(*op, &left, &right)? {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(Value::Bool(true))
    }
}

fn literal_value(lit: &Literal) -> Result<Value, RuntimeError> {
    Ok(match lit {
        Literal::Int(i) => Value::from(*i),
        Literal::Float(f) => Value::Number(Number::from_f64(*f).ok_or(RuntimeError::NonFiniteResult)?),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    })
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    let symbol = op.to_string();
    Ok(match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Gt => compare_values(&symbol, left, right)? == Ordering::Greater,
        CompareOp::Gte => compare_values(&symbol, left, right)? != Ordering::Less,
        CompareOp::Lt => compare_values(&symbol, left, right)? == Ordering::Less,
        CompareOp::Lte => compare_values(&symbol, left, right)? != Ordering::Greater,
    })
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value, RuntimeError> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!is_truthy(value)));
    }
    let num = Num::from_value(value).ok_or_else(|| RuntimeError::BadOperand {
        op: op.to_string(),
        operand: type_name(value).to_string(),
    })?;
    match (op, num) {
        (UnaryOp::Neg, Num::Int(i)) => i
            .checked_neg()
            .map(Value::from)
            .ok_or(RuntimeError::NumericOverflow),
        (UnaryOp::Neg, Num::Float(f)) => Num::Float(-f).into_value(),
        (_, n) => n.into_value(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value, limits: &EvalLimits) -> Result<Value, RuntimeError> {
    let symbol = op.to_string();
    let unsupported = || RuntimeError::unsupported(&symbol, type_name(left), type_name(right));

    if let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) {
        return arithmetic(op, a, b)?.into_value();
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            limits.check_len(a.len() + b.len())?;
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            limits.check_len(deep_len(left).saturating_add(deep_len(right)))?;
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Value::String(_) | Value::Array(_), _) => repeat(left, right, limits).ok_or_else(unsupported)?,
        (BinaryOp::Mul, _, Value::String(_) | Value::Array(_)) => repeat(right, left, limits).ok_or_else(unsupported)?,
        _ => Err(unsupported()),
    }
}

/// `seq * n`; `None` when `n` is not an integer
fn repeat(seq: &Value, count: &Value, limits: &EvalLimits) -> Option<Result<Value, RuntimeError>> {
    let times = match Num::from_value(count)? {
        Num::Int(i) => usize::try_from(i).unwrap_or(0),
        Num::Float(_) => return None,
    };
    Some(match seq {
        Value::String(s) => limits
            .check_len(s.len().saturating_mul(times))
            .map(|_| Value::String(s.repeat(times))),
        Value::Array(items) if items.is_empty() => Ok(Value::Array(Vec::new())),
        Value::Array(items) => limits
            .check_len(deep_len(seq).saturating_mul(times))
            .map(|_| {
                Value::Array(
                    std::iter::repeat(items.iter())
                        .take(times)
                        .flatten()
                        .cloned()
                        .collect(),
                )
            }),
        _ => return None,
    })
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> Result<Num, RuntimeError> {
    match op {
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Num::Float(a.as_f64() / b.as_f64()))
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            match (a, b) {
                // i64::MIN % -1 overflows in the checked op
                (Num::Int(_), Num::Int(-1)) => Ok(Num::Int(0)),
                (Num::Int(x), Num::Int(y)) => x
                    .checked_rem_euclid(y)
                    .map(|r| Num::Int(if y < 0 && r != 0 { r + y } else { r }))
                    .ok_or(RuntimeError::NumericOverflow),
                _ => {
                    let (x, y) = (a.as_f64(), b.as_f64());
                    let r = x % y;
                    Ok(Num::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
                }
            }
        }
        BinaryOp::Pow => power(a, b),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => match (a, b) {
            (Num::Int(x), Num::Int(y)) => {
                let result = match op {
                    BinaryOp::Add => x.checked_add(y),
                    BinaryOp::Sub => x.checked_sub(y),
                    _ => x.checked_mul(y),
                };
                result.map(Num::Int).ok_or(RuntimeError::NumericOverflow)
            }
            _ => {
                let (x, y) = (a.as_f64(), b.as_f64());
                Ok(Num::Float(match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    _ => x * y,
                }))
            }
        },
    }
}

fn power(base: Num, exponent: Num) -> Result<Num, RuntimeError> {
    if base.is_zero() && exponent.as_f64() < 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    match (base, exponent) {
        (Num::Int(1), Num::Int(_)) => Ok(Num::Int(1)),
        (Num::Int(-1), Num::Int(y)) if y >= 0 => Ok(Num::Int(if y % 2 == 0 { 1 } else { -1 })),
        (Num::Int(0), Num::Int(y)) if y >= 0 => Ok(Num::Int(if y == 0 { 1 } else { 0 })),
        (Num::Int(x), Num::Int(y)) if y >= 0 => {
            let y = u32::try_from(y).map_err(|_| RuntimeError::NumericOverflow)?;
            x.checked_pow(y).map(Num::Int).ok_or(RuntimeError::NumericOverflow)
        }
        _ => {
            let result = base.as_f64().powf(exponent.as_f64());
            if result.is_nan() {
                // Negative base with fractional exponent
                return Err(RuntimeError::unsupported("**", "negative number", "fractional power"));
            }
            Ok(Num::Float(result))
        }
    }
}

fn subscript(container: Value, index: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::Array(mut items) => {
            let i = normalize_index(index, items.len())?;
            Ok(items.swap_remove(i))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(index, chars.len())?;
            Ok(Value::String(chars[i].to_string()))
        }
        Value::Object(mut map) => {
            let key = match index {
                Value::String(key) => key,
                other => return Err(RuntimeError::KeyNotFound(other.to_string())),
            };
            map.remove(key)
                .ok_or_else(|| RuntimeError::KeyNotFound(key.clone()))
        }
        other => Err(RuntimeError::NotSubscriptable(type_name(&other).to_string())),
    }
}

/// Resolve a possibly negative integer index against `len`
fn normalize_index(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let i = match Num::from_value(index) {
        Some(Num::Int(i)) => i,
        _ => return Err(RuntimeError::InvalidIndex(type_name(index).to_string())),
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::IndexOutOfRange(i));
    }
    Ok(resolved as usize)
}

/// Read a whitelisted field off a mapping value
fn attribute(target: Value, name: &str) -> Result<Value, RuntimeError> {
    let missing = |kind: &str| RuntimeError::MissingAttribute {
        kind: kind.to_string(),
        name: name.to_string(),
    };
    match target {
        Value::Object(mut map) => map.remove(name).ok_or_else(|| missing("mapping")),
        other => Err(missing(type_name(&other))),
    }
}
