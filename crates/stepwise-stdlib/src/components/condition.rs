//! Safe evaluation of branch conditions.
//!
//! Conditions are written in a small whitelisted grammar: literals, variable
//! paths into the scope, comparisons and boolean combinators. Nothing else
//! parses, so a condition can read the scope but never call, assign or
//! compute.
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := not (("&&" | "and") not)*
//! not     := ("!" | "not") not | cmp
//! cmp     := primary (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in") primary)?
//! primary := number | string | true | false | null | path | "(" expr ")"
//! path    := ident ("." ident | "[" (string | integer) "]")*
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use stepwise_core::{CoreError, PredicateEvaluator};
use thiserror::Error;
use tracing::debug;

/// Longest accepted condition, in bytes
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Deepest accepted nesting of parentheses, negations and subscripts
pub const MAX_NESTING: usize = 64;

/// Why a condition could not be evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    /// Input longer than [`MAX_EXPRESSION_LENGTH`]
    #[error("expression is {0} bytes long, the limit is {}", MAX_EXPRESSION_LENGTH)]
    TooLong(usize),

    /// Nesting deeper than [`MAX_NESTING`]
    #[error("expression nests deeper than {} levels", MAX_NESTING)]
    TooDeep,

    /// Character outside the grammar
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    /// String literal without a closing quote
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    /// Token in a position the grammar does not allow
    #[error("unexpected {0}")]
    UnexpectedToken(String),

    /// Identifier followed by `(`
    #[error("function calls are not allowed ('{0}(')")]
    FunctionCall(String),

    /// Root identifier not present in the scope
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Ordering or membership between incompatible values
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        /// Operator
        op: &'static str,
        /// Type of the left operand
        left: &'static str,
        /// Type of the right operand
        right: &'static str,
    },
}

impl From<ConditionError> for CoreError {
    fn from(err: ConditionError) -> Self {
        CoreError::ExpressionError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Bang,
    AndAnd,
    OrOr,
    Cmp(CmpOp),
    Number(f64),
    Str(String),
    Ident(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string '{}'", s),
            Token::Ident(i) => format!("identifier '{}'", i),
            Token::Cmp(op) => format!("operator '{}'", op.as_str()),
            other => format!("{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl CmpOp {
    fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(String, Vec<Segment>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '<' | '>' => {
                let inclusive = next == Some('=');
                tokens.push(Token::Cmp(match (c, inclusive) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    _ => CmpOp::Ge,
                }));
                i += if inclusive { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    let (_, ch) = chars[j];
                    if ch == quote {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        j += 1;
                        match chars.get(j).map(|(_, c)| *c) {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => break,
                        }
                    } else {
                        text.push(ch);
                    }
                    j += 1;
                }
                if !closed {
                    return Err(ConditionError::UnterminatedString(offset));
                }
                tokens.push(Token::Str(text));
                i = j + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && next.map_or(false, |n| n.is_ascii_digit())) => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].1.is_ascii_digit() || chars[j].1 == '.') {
                    j += 1;
                }
                let end = chars.get(j).map_or(input.len(), |(o, _)| *o);
                let literal = &input[offset..end];
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedToken(format!("number '{}'", literal)))?;
                tokens.push(Token::Number(number));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
                    j += 1;
                }
                let end = chars.get(j).map_or(input.len(), |(o, _)| *o);
                let word = &input[offset..end];
                tokens.push(match word {
                    "and" => Token::AndAnd,
                    "or" => Token::OrOr,
                    "not" => Token::Bang,
                    "in" => Token::Cmp(CmpOp::In),
                    _ => Token::Ident(word.to_string()),
                });
                i = j;
            }
            other => return Err(ConditionError::UnexpectedChar(other, offset)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse(tokens: Vec<Token>) -> Result<Expr, ConditionError> {
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ConditionError::UnexpectedToken(token.describe())),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ConditionError::UnexpectedToken(token.describe())),
            None => Err(ConditionError::UnexpectedToken("end of expression".to_string())),
        }
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ConditionError::TooDeep);
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            self.enter()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Result<Expr, ConditionError> {
        let left = self.primary()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.primary()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "None" => Ok(Expr::Literal(Value::Null)),
                _ => self.path(word),
            },
            Some(token) => Err(ConditionError::UnexpectedToken(token.describe())),
            None => Err(ConditionError::UnexpectedToken("end of expression".to_string())),
        }
    }

    fn path(&mut self, root: String) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::LParen) {
            return Err(ConditionError::FunctionCall(root));
        }

        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => segments.push(Segment::Key(name)),
                        Some(token) => return Err(ConditionError::UnexpectedToken(token.describe())),
                        None => return Err(ConditionError::UnexpectedToken("end of expression".to_string())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.enter()?;
                    match self.advance() {
                        Some(Token::Str(key)) => segments.push(Segment::Key(key)),
                        Some(Token::Number(n)) if n.fract() == 0.0 => segments.push(Segment::Index(n as i64)),
                        Some(token) => return Err(ConditionError::UnexpectedToken(token.describe())),
                        None => return Err(ConditionError::UnexpectedToken("end of expression".to_string())),
                    }
                    self.expect(Token::RBracket)?;
                    self.depth -= 1;
                }
                Some(Token::LParen) => {
                    let name = match segments.last() {
                        Some(Segment::Key(key)) => key.clone(),
                        _ => root,
                    };
                    return Err(ConditionError::FunctionCall(name));
                }
                _ => break,
            }
        }
        Ok(Expr::Path(root, segments))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `null`, `false`, `0`, `""` and empty collections are false
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(x, y)),
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| equal(v, w)))
        }
        _ => left == right,
    }
}

fn order(op: CmpOp, left: &Value, right: &Value) -> Result<Ordering, ConditionError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or(ConditionError::TypeMismatch {
        op: op.as_str(),
        left: type_name(left),
        right: type_name(right),
    })
}

fn contains(needle: &Value, haystack: &Value) -> Result<bool, ConditionError> {
    match (needle, haystack) {
        (Value::String(n), Value::String(h)) => Ok(h.contains(n.as_str())),
        (_, Value::Array(items)) => Ok(items.iter().any(|item| equal(needle, item))),
        (Value::String(key), Value::Object(map)) => Ok(map.contains_key(key)),
        _ => Err(ConditionError::TypeMismatch {
            op: "in",
            left: type_name(needle),
            right: type_name(haystack),
        }),
    }
}

fn resolve(root: &str, segments: &[Segment], scope: &Value) -> Result<Value, ConditionError> {
    let mut current = scope
        .get(root)
        .ok_or_else(|| ConditionError::UnknownVariable(root.to_string()))?;

    for segment in segments {
        let next = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Index(index), Value::Array(items)) if *index >= 0 => items.get(*index as usize),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

fn eval(expr: &Expr, scope: &Value) -> Result<Value, ConditionError> {
    Ok(match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(root, segments) => resolve(root, segments, scope)?,
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, scope)?)),
        Expr::And(left, right) => {
            Value::Bool(truthy(&eval(left, scope)?) && truthy(&eval(right, scope)?))
        }
        Expr::Or(left, right) => {
            Value::Bool(truthy(&eval(left, scope)?) || truthy(&eval(right, scope)?))
        }
        Expr::Compare(op, left, right) => {
            let (l, r) = (eval(left, scope)?, eval(right, scope)?);
            Value::Bool(match op {
                CmpOp::Eq => equal(&l, &r),
                CmpOp::Ne => !equal(&l, &r),
                CmpOp::Lt => order(*op, &l, &r)? == Ordering::Less,
                CmpOp::Le => order(*op, &l, &r)? != Ordering::Greater,
                CmpOp::Gt => order(*op, &l, &r)? == Ordering::Greater,
                CmpOp::Ge => order(*op, &l, &r)? != Ordering::Less,
                CmpOp::In => contains(&l, &r)?,
            })
        }
    })
}

/// Whitelisted-grammar condition evaluator
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Create a new evaluator
    pub fn new() -> Self {
        Self
    }

    /// Evaluate to a raw value, before truthiness coercion
    pub fn evaluate_value(&self, expression: &str, scope: &Value) -> Result<Value, ConditionError> {
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(ConditionError::TooLong(expression.len()));
        }
        let expr = Parser::parse(tokenize(expression)?)?;
        eval(&expr, scope)
    }

    /// Evaluate and coerce the result to a boolean
    pub fn evaluate_bool(&self, expression: &str, scope: &Value) -> Result<bool, ConditionError> {
        self.evaluate_value(expression, scope).map(|v| truthy(&v))
    }
}

#[async_trait]
impl PredicateEvaluator for ExpressionEvaluator {
    async fn evaluate(&self, expression: &str, scope: &Value) -> Result<bool, CoreError> {
        let result = self.evaluate_bool(expression, scope)?;
        debug!(expression, result, "condition evaluated");
        Ok(result)
    }
}
