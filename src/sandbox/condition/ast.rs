// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition expressions
//!
//! One variant per permitted production. Anything the parser cannot map
//! onto this tree is rejected before evaluation starts.

/// A condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Number, string, boolean or null literal
    Literal(Literal),
    /// `[a, b, ...]`
    List(Vec<Expression>),
    /// `(a, b, ...)`; evaluates exactly like a list
    Tuple(Vec<Expression>),
    /// `{k: v, ...}`
    Mapping(Vec<(Expression, Expression)>),
    /// Bare identifier, resolved against the context at evaluation time
    Variable(String),
    /// `value[index]`
    Subscript {
        value: Box<Expression>,
        index: Box<Expression>,
    },
    /// `value.name`, limited to the context's attribute whitelist
    Attribute { value: Box<Expression>, name: String },
    /// `-x`, `+x`, `not x`
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// Arithmetic
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Comparison chain: `left op1 c1 op2 c2 ...`
    Compare {
        left: Box<Expression>,
        chain: Vec<(CompareOp, Expression)>,
    },
    /// `a and b and ...` / `a or b or ...`; every operand is evaluated
    Bool { op: BoolOp, operands: Vec<Expression> },
    /// Call to a whitelisted built-in
    Call {
        function: Function,
        args: Vec<Expression>,
    },
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// -
    Neg,
    /// +
    Pos,
    /// not
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// True division; always yields a float
    Div,
    Mod,
    Pow,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// The callable whitelist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Max,
    Min,
    Len,
}

impl Function {
    /// Resolve a callee name; anything outside the whitelist is `None`
    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "max" => Some(Function::Max),
            "min" => Some(Function::Min),
            "len" => Some(Function::Len),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Max => "max",
            Function::Min => "min",
            Function::Len => "len",
        }
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Pos => write!(f, "+"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Mod => write!(f, "%"),
            BinaryOp::Pow => write!(f, "**"),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl std::fmt::Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoolOp::And => write!(f, "and"),
            BoolOp::Or => write!(f, "or"),
        }
    }
}
