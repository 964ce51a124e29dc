// SPDX-License-Identifier: MIT

//! Tokenizer for condition expressions

use crate::sandbox::error::SandboxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    Lt,
    Lte,
    Gt,
    Gte,
    EqEq,
    NotEq,
    /// `=`; only ever legal as an error message
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Eof,
}

/// A token and the character offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::Null => write!(f, "None"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::DoubleStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Assign => write!(f, "="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Keywords of the host-language family that have no place in a condition
const FORBIDDEN_KEYWORDS: &[(&str, &str)] = &[
    ("in", "'in' operator"),
    ("is", "'is' operator"),
    ("lambda", "lambda"),
    ("if", "conditional expression"),
    ("else", "conditional expression"),
    ("for", "comprehension"),
    ("async", "comprehension"),
    ("await", "await"),
    ("yield", "yield"),
    ("import", "import statement"),
];

/// Split a condition into tokens, ending with `Token::Eof`
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, SandboxError> {
    Lexer {
        chars: input.chars().collect(),
        pos: 0,
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Spanned>, SandboxError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek(0) {
            let start = self.pos;
            let token = if c.is_whitespace() {
                self.pos += 1;
                continue;
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit()))
            {
                self.number()?
            } else if c.is_alphabetic() || c == '_' {
                self.word()?
            } else if c == '\'' || c == '"' {
                self.string(c)?
            } else {
                self.symbol(c)?
            };
            tokens.push(Spanned { token, pos: start });
        }
        tokens.push(Spanned {
            token: Token::Eof,
            pos: self.pos,
        });
        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, SandboxError> {
        let start = self.pos;
        let mut is_float = false;

        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') {
            is_float = true;
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek(1), Some('+' | '-')));
            if self.peek(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(SandboxError::syntax(
                format!("invalid numeric literal '{}'", text),
                start,
            ));
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Token::Float(f)),
                _ => Err(SandboxError::syntax(
                    format!("invalid float literal '{}'", text),
                    start,
                )),
            }
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| {
                SandboxError::syntax(format!("integer literal too large '{}'", text), start)
            })
        }
    }

    fn word(&mut self) -> Result<Token, SandboxError> {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if let Some((_, construct)) = FORBIDDEN_KEYWORDS.iter().find(|(kw, _)| *kw == word) {
            return Err(SandboxError::disallowed(*construct));
        }

        Ok(match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" | "true" => Token::True,
            "False" | "false" => Token::False,
            "None" | "null" => Token::Null,
            _ => Token::Ident(word),
        })
    }

    fn string(&mut self, quote: char) -> Result<Token, SandboxError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let c = self
                .peek(0)
                .ok_or_else(|| SandboxError::syntax("unterminated string literal", start))?;
            self.pos += 1;
            if c == quote {
                return Ok(Token::Str(out));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escaped = self
                .peek(0)
                .ok_or_else(|| SandboxError::syntax("unterminated string literal", start))?;
            self.pos += 1;
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                '\\' | '\'' | '"' => escaped,
                other => {
                    return Err(SandboxError::syntax(
                        format!("unsupported escape sequence '\\{}'", other),
                        self.pos - 2,
                    ))
                }
            });
        }
    }

    fn symbol(&mut self, c: char) -> Result<Token, SandboxError> {
        let start = self.pos;
        let next = self.peek(1);
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('*', _) => (Token::Star, 1),
            ('/', Some('/')) => return Err(SandboxError::disallowed("floor division '//'")),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('<', Some('=')) => (Token::Lte, 2),
            ('<', Some('<')) | ('>', Some('>')) => {
                return Err(SandboxError::disallowed("bit shift operator"))
            }
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::Gte, 2),
            ('>', _) => (Token::Gt, 1),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', Some('=')) => (Token::NotEq, 2),
            (':', Some('=')) => return Err(SandboxError::disallowed("assignment expression ':='")),
            (':', _) => (Token::Colon, 1),
            ('&' | '|' | '^' | '~', _) => {
                return Err(SandboxError::disallowed(format!("bitwise operator '{}'", c)))
            }
            ('@', _) => return Err(SandboxError::disallowed("matrix multiplication '@'")),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            _ => {
                return Err(SandboxError::syntax(
                    format!("unexpected character '{}'", c),
                    start,
                ))
            }
        };
        self.pos += width;
        Ok(token)
    }
}
