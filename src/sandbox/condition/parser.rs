//! Condition expression parser
//!
//! Recursive descent over the token stream, producing the closed
//! `Expression` tree. Precedence, loosest first:
//! `or`, `and`, `not`, comparison chains, `+ -`, `* / %`, unary `- +`,
//! `**`, then calls, subscripts and attribute reads.

use super::ast::{BinaryOp, BoolOp, CompareOp, Expression, Function, Literal, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use crate::sandbox::error::SandboxError;
use crate::sandbox::limits::EvalLimits;

/// Most `+ - * / %` operators one expression may contain. Chains of them
/// nest the tree one level per operator, so this also caps tree height.
pub const MAX_OPERATORS: usize = 4096;

/// Parse a condition expression string into an AST using default limits
pub fn parse(input: &str) -> Result<Expression, SandboxError> {
    parse_with_limits(input, &EvalLimits::default())
}

/// Parse a condition expression, rejecting nesting deeper than `limits.max_depth`
pub fn parse_with_limits(input: &str, limits: &EvalLimits) -> Result<Expression, SandboxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth: limits.max_depth,
        operators: 0,
    };

    if parser.peek() == &Token::Eof {
        return Err(SandboxError::syntax("empty expression", 0));
    }
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
    operators: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), SandboxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> SandboxError {
        match self.peek() {
            Token::Assign => SandboxError::disallowed("assignment '='"),
            Token::Eof => SandboxError::syntax("unexpected end of input", self.position()),
            other => SandboxError::syntax(format!("unexpected '{}'", other), self.position()),
        }
    }

    fn expect_end(&mut self) -> Result<(), SandboxError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), SandboxError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SandboxError::syntax(
                format!("expression nested too deeply (limit {})", self.max_depth),
                self.position(),
            ));
        }
        Ok(())
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SandboxError>,
    ) -> Result<T, SandboxError> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expression, SandboxError> {
        self.nested(Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expression, SandboxError> {
        let mut operands = vec![self.and_expr()?];
        while self.eat(&Token::Or) {
            operands.push(self.and_expr()?);
        }
        Ok(bool_node(BoolOp::Or, operands))
    }

    fn and_expr(&mut self) -> Result<Expression, SandboxError> {
        let mut operands = vec![self.not_expr()?];
        while self.eat(&Token::And) {
            operands.push(self.not_expr()?);
        }
        Ok(bool_node(BoolOp::And, operands))
    }

    fn not_expr(&mut self) -> Result<Expression, SandboxError> {
        if self.eat(&Token::Not) {
            let operand = self.nested(Self::not_expr)?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression, SandboxError> {
        let left = self.arith()?;
        let mut chain = Vec::new();
        while let Some(op) = compare_op(self.peek()) {
            self.advance();
            chain.push((op, self.arith()?));
        }
        if chain.is_empty() {
            return Ok(left);
        }
        Ok(Expression::Compare {
            left: Box::new(left),
            chain,
        })
    }

    fn arith(&mut self) -> Result<Expression, SandboxError> {
        self.binary_chain(Self::term, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Expression, SandboxError> {
        self.binary_chain(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    /// Left-associative operator chain; the whole chain counts as one
    /// nesting level, and every operator counts against `MAX_OPERATORS`
    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, SandboxError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expression, SandboxError> {
        let mut left = operand(self)?;
        if op_for(self.peek()).is_none() {
            return Ok(left);
        }
        self.nested(|p| {
            while let Some(op) = op_for(p.peek()) {
                p.operators += 1;
                if p.operators > MAX_OPERATORS {
                    return Err(SandboxError::syntax(
                        format!("too many operators (limit {})", MAX_OPERATORS),
                        p.position(),
                    ));
                }
                p.advance();
                let right = operand(p)?;
                left = Expression::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            }
            Ok(left)
        })
    }

    fn unary(&mut self) -> Result<Expression, SandboxError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expression, SandboxError> {
        let base = self.postfix()?;
        if !self.eat(&Token::DoubleStar) {
            return Ok(base);
        }
        // Right-associative, and the exponent may carry its own sign: 2 ** -1
        let exponent = self.nested(Self::unary)?;
        Ok(Expression::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn postfix(&mut self) -> Result<Expression, SandboxError> {
        let mut expr = self.atom()?;
        let mut levels = 0;
        loop {
            expr = match self.peek() {
                Token::LParen => {
                    let function = resolve_callee(&expr)?;
                    self.advance();
                    let args = self.call_args()?;
                    Expression::Call { function, args }
                }
                Token::LBracket => {
                    self.advance();
                    if self.peek() == &Token::Colon {
                        return Err(SandboxError::disallowed("slice"));
                    }
                    let index = self.expression()?;
                    if self.peek() == &Token::Colon || self.peek() == &Token::Comma {
                        return Err(SandboxError::disallowed("slice"));
                    }
                    self.expect(&Token::RBracket)?;
                    Expression::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                Token::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Ident(name) => name,
                        other => {
                            return Err(SandboxError::syntax(
                                format!("expected attribute name, found '{}'", other),
                                self.position(),
                            ))
                        }
                    };
                    Expression::Attribute {
                        value: Box::new(expr),
                        name,
                    }
                }
                _ => break,
            };
            self.enter()?;
            levels += 1;
        }
        self.depth -= levels;
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<Vec<Expression>, SandboxError> {
        let mut args = Vec::new();
        while self.peek() != &Token::RParen {
            match (self.peek(), self.peek_at(1)) {
                (Token::Star, _) => return Err(SandboxError::disallowed("starred argument")),
                (Token::DoubleStar, _) => {
                    return Err(SandboxError::disallowed("keyword argument unpacking"))
                }
                (Token::Ident(name), Token::Assign) => {
                    return Err(SandboxError::disallowed(format!(
                        "keyword argument '{}='",
                        name
                    )))
                }
                _ => {}
            }
            args.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn atom(&mut self) -> Result<Expression, SandboxError> {
        let expr = match self.peek().clone() {
            Token::Int(i) => Expression::Literal(Literal::Int(i)),
            Token::Float(f) => Expression::Literal(Literal::Float(f)),
            Token::Str(s) => Expression::Literal(Literal::String(s)),
            Token::True => Expression::Literal(Literal::Boolean(true)),
            Token::False => Expression::Literal(Literal::Boolean(false)),
            Token::Null => Expression::Literal(Literal::Null),
            Token::Ident(name) => Expression::Variable(name),
            Token::LParen => {
                self.advance();
                return self.parenthesized();
            }
            Token::LBracket => {
                self.advance();
                return Ok(Expression::List(self.sequence(&Token::RBracket)?));
            }
            Token::LBrace => {
                self.advance();
                return self.mapping();
            }
            Token::Star => return Err(SandboxError::disallowed("starred expression")),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// After `(`: grouping, or a tuple if a comma appears
    fn parenthesized(&mut self) -> Result<Expression, SandboxError> {
        if self.eat(&Token::RParen) {
            return Ok(Expression::Tuple(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }
        if !self.eat(&Token::Comma) {
            return Err(self.unexpected());
        }
        let mut items = vec![first];
        items.extend(self.sequence(&Token::RParen)?);
        Ok(Expression::Tuple(items))
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed
    fn sequence(&mut self, close: &Token) -> Result<Vec<Expression>, SandboxError> {
        let mut items = Vec::new();
        while self.peek() != close {
            if self.peek() == &Token::Star {
                return Err(SandboxError::disallowed("starred expression"));
            }
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    /// After `{`: `key: value` pairs
    fn mapping(&mut self) -> Result<Expression, SandboxError> {
        let mut entries = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.peek() == &Token::DoubleStar {
                return Err(SandboxError::disallowed("mapping unpacking"));
            }
            let key = self.expression()?;
            if matches!(self.peek(), Token::Comma | Token::RBrace) {
                return Err(SandboxError::disallowed("set literal"));
            }
            self.expect(&Token::Colon)?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expression::Mapping(entries))
    }
}

fn bool_node(op: BoolOp, mut operands: Vec<Expression>) -> Expression {
    if operands.len() == 1 {
        if let Some(only) = operands.pop() {
            return only;
        }
    }
    Expression::Bool { op, operands }
}

fn compare_op(token: &Token) -> Option<CompareOp> {
    match token {
        Token::EqEq => Some(CompareOp::Eq),
        Token::NotEq => Some(CompareOp::NotEq),
        Token::Gt => Some(CompareOp::Gt),
        Token::Gte => Some(CompareOp::Gte),
        Token::Lt => Some(CompareOp::Lt),
        Token::Lte => Some(CompareOp::Lte),
        _ => None,
    }
}

/// Only a bare whitelisted name may be called
fn resolve_callee(callee: &Expression) -> Result<Function, SandboxError> {
    match callee {
        Expression::Variable(name) => {
            Function::from_name(name).ok_or_else(|| SandboxError::restricted_call(name.clone()))
        }
        Expression::Attribute { name, .. } => {
            Err(SandboxError::restricted_call(format!("method '.{}()'", name)))
        }
        Expression::Call { function, .. } => Err(SandboxError::restricted_call(format!(
            "result of {}()",
            function.name()
        ))),
        _ => Err(SandboxError::restricted_call("non-name callee")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expression {
        Expression::Variable(name.to_string())
    }

    fn int(i: i64) -> Expression {
        Expression::Literal(Literal::Int(i))
    }

    fn string(s: &str) -> Expression {
        Expression::Literal(Literal::String(s.to_string()))
    }

    fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse("age >= 18").unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                left: Box::new(var("age")),
                chain: vec![(CompareOp::Gte, int(18))],
            }
        );
    }

    #[test]
    fn test_parse_comparison_chain() {
        let expr = parse("1 < x <= 10").unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                left: Box::new(int(1)),
                chain: vec![(CompareOp::Lt, var("x")), (CompareOp::Lte, int(10))],
            }
        );
    }

    #[test]
    fn test_parse_string_equality() {
        let expr = parse(r#"state != "CA""#).unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                left: Box::new(var("state")),
                chain: vec![(CompareOp::NotEq, string("CA"))],
            }
        );
    }

    #[test]
    fn test_parse_and_or_flatten() {
        let expr = parse("a or b or c and d").unwrap();
        assert_eq!(
            expr,
            Expression::Bool {
                op: BoolOp::Or,
                operands: vec![
                    var("a"),
                    var("b"),
                    Expression::Bool {
                        op: BoolOp::And,
                        operands: vec![var("c"), var("d")],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_parse_not_binds_looser_than_comparison() {
        let expr = parse("not age < 18").unwrap();
        match expr {
            Expression::Unary {
                op: UnaryOp::Not,
                operand,
            } => assert!(matches!(*operand, Expression::Compare { .. })),
            other => panic!("Expected Not, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let expr = parse("1 + 2 * 3 - 4").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Sub,
                binary(BinaryOp::Add, int(1), binary(BinaryOp::Mul, int(2), int(3))),
                int(4)
            )
        );
    }

    #[test]
    fn test_parse_power_is_right_associative_and_tighter_than_unary() {
        let expr = parse("-2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(binary(
                    BinaryOp::Pow,
                    int(2),
                    binary(BinaryOp::Pow, int(3), int(2))
                )),
            }
        );
    }

    #[test]
    fn test_parse_negative_exponent() {
        let expr = parse("2 ** -1").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Pow,
                int(2),
                Expression::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(int(1)),
                }
            )
        );
    }

    #[test]
    fn test_parse_collections() {
        assert_eq!(
            parse("[1, 'a',]").unwrap(),
            Expression::List(vec![int(1), string("a")])
        );
        assert_eq!(
            parse("(1, 2)").unwrap(),
            Expression::Tuple(vec![int(1), int(2)])
        );
        assert_eq!(parse("(1,)").unwrap(), Expression::Tuple(vec![int(1)]));
        assert_eq!(parse("()").unwrap(), Expression::Tuple(vec![]));
        assert_eq!(parse("(1)").unwrap(), int(1));
        assert_eq!(
            parse("{'gl': 1000000}").unwrap(),
            Expression::Mapping(vec![(string("gl"), int(1_000_000))])
        );
    }

    #[test]
    fn test_parse_postfix_chain() {
        let expr = parse("loss_runs_36mo[0].paid").unwrap();
        assert_eq!(
            expr,
            Expression::Attribute {
                value: Box::new(Expression::Subscript {
                    value: Box::new(var("loss_runs_36mo")),
                    index: Box::new(int(0)),
                }),
                name: "paid".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_whitelisted_call() {
        let expr = parse("len(loss_runs_36mo)").unwrap();
        assert_eq!(
            expr,
            Expression::Call {
                function: Function::Len,
                args: vec![var("loss_runs_36mo")],
            }
        );
    }

    #[test]
    fn test_parse_rejects_unlisted_function() {
        assert_eq!(
            parse("open('/etc/passwd')"),
            Err(SandboxError::RestrictedFunctionCall("open".to_string()))
        );
        assert_eq!(
            parse("eval('1')"),
            Err(SandboxError::RestrictedFunctionCall("eval".to_string()))
        );
        assert_eq!(
            parse("__import__('os')"),
            Err(SandboxError::RestrictedFunctionCall("__import__".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_call_by_value() {
        assert!(matches!(
            parse("address.get('city')"),
            Err(SandboxError::RestrictedFunctionCall(_))
        ));
        assert!(matches!(
            parse("[max][0](1, 2)"),
            Err(SandboxError::RestrictedFunctionCall(_))
        ));
    }

    #[test]
    fn test_parse_rejects_disallowed_syntax() {
        for input in [
            "max(1, key=len)",
            "max(*items)",
            "items[1:2]",
            "{1, 2}",
            "x = 5",
            "[x for x in items]",
        ] {
            assert!(
                matches!(parse(input), Err(SandboxError::DisallowedExpression(_))),
                "expected {} to be disallowed, got {:?}",
                input,
                parse(input)
            );
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            parse("this is not valid"),
            Err(SandboxError::DisallowedExpression(_))
        ));
        assert!(matches!(parse("age >="), Err(SandboxError::Syntax { .. })));
        assert!(matches!(parse("(1 + 2"), Err(SandboxError::Syntax { .. })));
        assert!(matches!(parse("1 2"), Err(SandboxError::Syntax { .. })));
        assert!(matches!(parse(""), Err(SandboxError::Syntax { .. })));
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&deep).unwrap(), int(1));

        let tight = EvalLimits::new(10, 40);
        assert!(matches!(
            parse_with_limits(&deep, &tight),
            Err(SandboxError::Syntax { .. })
        ));

        let too_deep = format!("{}1{}", "(".repeat(120), ")".repeat(120));
        assert!(parse(&too_deep).is_err());
    }

    #[test]
    fn test_parse_long_flat_chains() {
        let sum = vec!["1"; 1000].join(" + ");
        assert!(parse(&sum).is_ok());

        let mixed = vec!["x * 2"; 500].join(" - ");
        assert!(parse(&mixed).is_ok());

        // A chain is one level, whatever its length
        let tight = EvalLimits::new(10, 4);
        assert!(parse_with_limits(&vec!["1"; 300].join(" + "), &tight).is_ok());
    }

    #[test]
    fn test_parse_operator_cap() {
        let at_cap = vec!["1"; MAX_OPERATORS + 1].join(" + ");
        assert!(parse(&at_cap).is_ok());

        let over = vec!["1"; MAX_OPERATORS + 2].join(" + ");
        assert!(matches!(parse(&over), Err(SandboxError::Syntax { .. })));

        // Operators in nested groups count towards the same total
        let half = vec!["1"; MAX_OPERATORS / 2 + 1].join(" * ");
        let split = format!("({}) + ({})", half, half);
        assert!(matches!(parse(&split), Err(SandboxError::Syntax { .. })));
    }
}
