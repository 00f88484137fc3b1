//! Condition-expression compiler and evaluator.
//!
//! `<if test="...">` and `<when test="...">` attributes are compiled once,
//! at mapper-parse time, into an [`Expression`]. Evaluation walks the
//! compiled tree against a [`ParamView`] and yields a [`Value`]; the node
//! layer applies the truthiness rules.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};
use crate::param::ParamView;
use crate::value::Value;

/// A compiled test expression.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Expr,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Path(String),
    Len(Box<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Binding power; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
    Len,
    Not,
    Minus,
    LParen,
    RParen,
    Op(BinaryOp),
}

impl Expression {
    /// Compile `source`; syntax errors fail the whole mapper load.
    pub fn compile(source: &str) -> Result<Expression> {
        let tokens = tokenize(source).map_err(|message| Error::ExpressionSyntax {
            message,
            source_expr: source.to_string(),
        })?;
        let mut parser = Parser {
            tokens: tokens.into_iter().peekable(),
        };
        let root = parser.expression(0).map_err(|message| Error::ExpressionSyntax {
            message,
            source_expr: source.to_string(),
        })?;
        if let Some(extra) = parser.tokens.next() {
            return Err(Error::ExpressionSyntax {
                message: format!("unexpected trailing {:?}", extra),
                source_expr: source.to_string(),
            });
        }
        Ok(Expression {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `params`; missing identifiers resolve to null.
    pub fn eval(&self, params: &dyn ParamView) -> Result<Value> {
        eval_expr(&self.root, params)
    }
}

fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut iter = source.chars().peekable();
    while let Some(&ch) = iter.peek() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                iter.next();
            }
            '(' => {
                iter.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                iter.next();
                tokens.push(Token::RParen);
            }
            '+' => {
                iter.next();
                tokens.push(Token::Op(BinaryOp::Add));
            }
            '-' => {
                iter.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                iter.next();
                tokens.push(Token::Op(BinaryOp::Mul));
            }
            '/' => {
                iter.next();
                tokens.push(Token::Op(BinaryOp::Div));
            }
            '%' => {
                iter.next();
                tokens.push(Token::Op(BinaryOp::Rem));
            }
            '=' => {
                iter.next();
                expect_char(&mut iter, '=')?;
                tokens.push(Token::Op(BinaryOp::Eq));
            }
            '!' => {
                iter.next();
                if iter.peek() == Some(&'=') {
                    iter.next();
                    tokens.push(Token::Op(BinaryOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                iter.next();
                if iter.peek() == Some(&'=') {
                    iter.next();
                    tokens.push(Token::Op(BinaryOp::Le));
                } else {
                    tokens.push(Token::Op(BinaryOp::Lt));
                }
            }
            '>' => {
                iter.next();
                if iter.peek() == Some(&'=') {
                    iter.next();
                    tokens.push(Token::Op(BinaryOp::Ge));
                } else {
                    tokens.push(Token::Op(BinaryOp::Gt));
                }
            }
            '&' => {
                iter.next();
                expect_char(&mut iter, '&')?;
                tokens.push(Token::Op(BinaryOp::And));
            }
            '|' => {
                iter.next();
                expect_char(&mut iter, '|')?;
                tokens.push(Token::Op(BinaryOp::Or));
            }
            '\'' | '"' => {
                iter.next();
                tokens.push(Token::Str(tokenize_string(&mut iter, ch)?));
            }
            '0'..='9' => tokens.push(tokenize_number(&mut iter)?),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = tokenize_path(&mut iter);
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "nil" => Token::Null,
                    "and" => Token::Op(BinaryOp::And),
                    "or" => Token::Op(BinaryOp::Or),
                    "not" => Token::Not,
                    "len" => Token::Len,
                    _ => Token::Path(word),
                });
            }
            other => return Err(format!("unexpected character {:?}", other)),
        }
    }
    Ok(tokens)
}

fn expect_char(iter: &mut Peekable<Chars<'_>>, expected: char) -> std::result::Result<(), String> {
    match iter.next() {
        Some(c) if c == expected => Ok(()),
        other => Err(format!("expected {:?}, found {:?}", expected, other)),
    }
}

fn tokenize_string(
    iter: &mut Peekable<Chars<'_>>,
    quote: char,
) -> std::result::Result<String, String> {
    let mut out = String::new();
    for c in iter.by_ref() {
        if c == quote {
            return Ok(out);
        }
        out.push(c);
    }
    Err("unterminated string literal".to_string())
}

fn tokenize_number(iter: &mut Peekable<Chars<'_>>) -> std::result::Result<Token, String> {
    let mut text = String::new();
    let mut is_float = false;
    while let Some(&c) = iter.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            iter.next();
        } else if c == '.' {
            // A digit must follow; `1.x` is a path error, not a float.
            let mut ahead = iter.clone();
            ahead.next();
            if ahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                text.push(c);
                iter.next();
            } else {
                break;
            }
        } else {
            break;
        }
    }
    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| e.to_string())
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| e.to_string())
    }
}

fn tokenize_path(iter: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = iter.peek() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            out.push(c);
            iter.next();
        } else {
            break;
        }
    }
    out
}

struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
}

impl Parser {
    /// Precedence climbing over binary operators.
    fn expression(&mut self, min_precedence: u8) -> std::result::Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op)) = self.tokens.peek().cloned() {
            if op.precedence() < min_precedence {
                break;
            }
            self.tokens.next();
            let rhs = self.expression(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> std::result::Result<Expr, String> {
        match self.tokens.peek() {
            Some(Token::Not) => {
                self.tokens.next();
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.unary()?),
                })
            }
            Some(Token::Minus) => {
                self.tokens.next();
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.unary()?),
                })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> std::result::Result<Expr, String> {
        match self.tokens.next() {
            Some(Token::Int(v)) => Ok(Expr::Literal(Value::Int(v))),
            Some(Token::Float(v)) => Ok(Expr::Literal(Value::Float(v))),
            Some(Token::Str(v)) => Ok(Expr::Literal(Value::Text(v))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Path(path)) => Ok(Expr::Path(path)),
            Some(Token::Len) => {
                self.expect(Token::LParen)?;
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Len(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(format!("expected operand, found {:?}", other)),
        }
    }

    fn expect(&mut self, expected: Token) -> std::result::Result<(), String> {
        match self.tokens.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(format!("expected {:?}, found {:?}", expected, other)),
        }
    }
}

fn eval_expr(expr: &Expr, params: &dyn ParamView) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(path) => Ok(params.get(path).unwrap_or(Value::Null)),
        Expr::Len(inner) => {
            let v = eval_expr(inner, params)?;
            let len = match &v {
                Value::Text(s) => s.chars().count(),
                Value::Bytes(b) => b.len(),
                Value::Array(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(Error::ExpressionEval {
                        message: format!("len() is not defined for {} values", other.kind()),
                    })
                }
            };
            Ok(Value::Int(len as i64))
        }
        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, params)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                UnaryOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Uint(u) => Ok(Value::Int(-(u as i64))),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(Error::ExpressionEval {
                        message: format!("cannot negate {} value", other.kind()),
                    }),
                },
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, params),
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, params: &dyn ParamView) -> Result<Value> {
    // Short-circuit logic first.
    match op {
        BinaryOp::And => {
            let l = eval_expr(lhs, params)?;
            if !l.is_truthy() {
                return Ok(Value::Bool(false));
            }
            let r = eval_expr(rhs, params)?;
            return Ok(Value::Bool(r.is_truthy()));
        }
        BinaryOp::Or => {
            let l = eval_expr(lhs, params)?;
            if l.is_truthy() {
                return Ok(Value::Bool(true));
            }
            let r = eval_expr(rhs, params)?;
            return Ok(Value::Bool(r.is_truthy()));
        }
        _ => {}
    }

    let l = eval_expr(lhs, params)?;
    let r = eval_expr(rhs, params)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&l, &r)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        BinaryOp::Add => {
            if let (Value::Text(a), Value::Text(b)) = (&l, &r) {
                return Ok(Value::Text(format!("{a}{b}")));
            }
            arithmetic(&l, &r, i64::checked_add, |a, b| a + b)
        }
        BinaryOp::Sub => arithmetic(&l, &r, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(&l, &r, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => {
            if matches!(r, Value::Int(0) | Value::Uint(0)) {
                return Err(Error::ExpressionEval {
                    message: "division by zero".to_string(),
                });
            }
            arithmetic(&l, &r, i64::checked_div, |a, b| a / b)
        }
        BinaryOp::Rem => {
            if matches!(r, Value::Int(0) | Value::Uint(0)) {
                return Err(Error::ExpressionEval {
                    message: "division by zero".to_string(),
                });
            }
            arithmetic(&l, &r, i64::checked_rem, |a, b| a % b)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Uint(u) => Some(*u as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Uint(u) => i64::try_from(*u).ok(),
        _ => None,
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_i64(l), as_i64(r)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
        return a == b;
    }
    l == r
}

fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_i64(l), as_i64(r)) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
        return a.partial_cmp(&b).ok_or_else(|| Error::ExpressionEval {
            message: "NaN is not ordered".to_string(),
        });
    }
    if let (Value::Text(a), Value::Text(b)) = (l, r) {
        return Ok(a.cmp(b));
    }
    Err(Error::ExpressionEval {
        message: format!("cannot order {} against {}", l.kind(), r.kind()),
    })
}

fn arithmetic(
    l: &Value,
    r: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (Some(a), Some(b)) = (as_i64(l), as_i64(r)) {
        return int_op(a, b).map(Value::Int).ok_or_else(|| Error::ExpressionEval {
            message: "integer overflow".to_string(),
        });
    }
    if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
        return Ok(Value::Float(float_op(a, b)));
    }
    Err(Error::ExpressionEval {
        message: format!(
            "arithmetic is not defined between {} and {}",
            l.kind(),
            r.kind()
        ),
    })
}
