//! Minimal query-expression AST.
//!
//! Just enough of the persisted expression language to rewrite divisions
//! safely: numbers, identifiers, string literals, unary minus, the binary
//! operators `+ - * / ||`, parenthesized groups and comma lists, and calls
//! with an optional `OVER (...)` clause. The window clause is kept verbatim.
//!
//! Every node carries the byte span it was parsed from so text-level passes
//! can splice the original string instead of re-rendering it.

use std::fmt;
use std::ops::Range;

use crate::error::{EngineError, Result};

pub type Span = Range<usize>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Concat => 0,
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Number(String),
    /// Bare, dotted or double-quoted identifier, as written.
    Ident(String),
    /// Single-quoted string literal, quotes included.
    Str(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Group(Box<Expr>),
    /// Parenthesized comma list with at least two items.
    List(Vec<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
        over: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr { kind, span }
    }

    /// `NAME(args)` with no window clause, spanning `span`.
    pub fn call(name: &str, args: Vec<Expr>, span: Span) -> Expr {
        Expr::new(
            ExprKind::Call {
                name: name.to_string(),
                args,
                over: None,
            },
            span,
        )
    }

    pub fn number(text: &str, span: Span) -> Expr {
        Expr::new(ExprKind::Number(text.to_string()), span)
    }

    /// True for a numeric literal equal to zero (`0`, `0.0`, `0e1`).
    pub fn is_zero(&self) -> bool {
        matches!(&self.kind, ExprKind::Number(n) if n.parse::<f64>().is_ok_and(|v| v == 0.0))
    }

    /// Case-insensitive check for a call without a window clause.
    pub fn is_call_named(&self, expected: &str) -> bool {
        matches!(&self.kind, ExprKind::Call { name, over: None, .. } if name.eq_ignore_ascii_case(expected))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number(text) | ExprKind::Ident(text) | ExprKind::Str(text) => {
                f.write_str(text)
            }
            ExprKind::Neg(inner) => {
                let inner = inner.to_string();
                if inner.starts_with('-') {
                    write!(f, "- {}", inner)
                } else {
                    write!(f, "-{}", inner)
                }
            }
            ExprKind::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            ExprKind::Group(inner) => write!(f, "({})", inner),
            ExprKind::List(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            ExprKind::Call { name, args, over } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")?;
                if let Some(clause) = over {
                    write!(f, " OVER ({})", clause)?;
                }
                Ok(())
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Number,
    Ident,
    Str,
    Op(BinaryOp),
    LParen,
    RParen,
    Comma,
}

#[derive(Clone, Debug)]
struct Token {
    tok: Tok,
    span: Span,
}

fn parse_error(position: usize, message: impl Into<String>) -> EngineError {
    EngineError::Parse {
        position,
        message: message.into(),
    }
}

fn lex(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;
        let tok = match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'+' => {
                i += 1;
                Tok::Op(BinaryOp::Add)
            }
            b'-' => {
                i += 1;
                Tok::Op(BinaryOp::Sub)
            }
            b'*' => {
                i += 1;
                Tok::Op(BinaryOp::Mul)
            }
            b'/' => {
                i += 1;
                Tok::Op(BinaryOp::Div)
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                i += 2;
                Tok::Op(BinaryOp::Concat)
            }
            b'(' => {
                i += 1;
                Tok::LParen
            }
            b')' => {
                i += 1;
                Tok::RParen
            }
            b',' => {
                i += 1;
                Tok::Comma
            }
            b'\'' | b'"' => {
                i = scan_quoted(bytes, i)?;
                if b == b'\'' { Tok::Str } else { Tok::Ident }
            }
            b'0'..=b'9' | b'.' => {
                i = scan_number(bytes, i)?;
                Tok::Number
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.')) {
                    i += 1;
                }
                Tok::Ident
            }
            _ => return Err(parse_error(i, "unexpected character")),
        };
        tokens.push(Token {
            tok,
            span: start..i,
        });
    }

    Ok(tokens)
}

/// Quoted text; a doubled quote character escapes itself.
fn scan_quoted(bytes: &[u8], start: usize) -> Result<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(parse_error(start, "unterminated quoted text"))
}

fn scan_number(bytes: &[u8], start: usize) -> Result<usize> {
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = digits(start);
    let int_len = i - start;
    let mut frac_len = 0;
    if bytes.get(i) == Some(&b'.') {
        let after = digits(i + 1);
        frac_len = after - (i + 1);
        i = after;
    }
    if int_len == 0 && frac_len == 0 {
        return Err(parse_error(start, "malformed number"));
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let end = digits(j);
        if end == j {
            return Err(parse_error(i, "malformed exponent"));
        }
        i = end;
    }
    Ok(i)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a query expression.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expr(0)?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(parse_error(extra.span.start, "unexpected trailing input"));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| parse_error(self.source.len(), "unexpected end of expression"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_rparen(&mut self) -> Result<Token> {
        let token = self.next()?;
        if token.tok != Tok::RParen {
            return Err(parse_error(token.span.start, "expected `)`"));
        }
        Ok(token)
    }

    fn text(&self, span: &Span) -> &'a str {
        &self.source[span.clone()]
    }

    fn expr(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token { tok: Tok::Op(op), .. }) = self.peek() {
            let op = *op;
            if op.precedence() < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(op.precedence() + 1)?;
            let span = lhs.span.start..rhs.span.end;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(Token {
            tok: Tok::Op(BinaryOp::Sub),
            span,
        }) = self.peek()
        {
            let start = span.start;
            self.pos += 1;
            let inner = self.unary()?;
            let span = start..inner.span.end;
            return Ok(Expr::new(ExprKind::Neg(Box::new(inner)), span));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.next()?;
        let span = token.span.clone();
        match token.tok {
            Tok::Number => Ok(Expr::new(ExprKind::Number(self.text(&span).to_string()), span)),
            Tok::Str => Ok(Expr::new(ExprKind::Str(self.text(&span).to_string()), span)),
            Tok::Ident => {
                if matches!(self.peek(), Some(Token { tok: Tok::LParen, .. })) {
                    self.call(span)
                } else {
                    Ok(Expr::new(ExprKind::Ident(self.text(&span).to_string()), span))
                }
            }
            Tok::LParen => {
                let items = self.items()?;
                let close = self.expect_rparen()?;
                let span = span.start..close.span.end;
                let mut items = items;
                if items.len() == 1 {
                    let inner = items.remove(0);
                    Ok(Expr::new(ExprKind::Group(Box::new(inner)), span))
                } else {
                    Ok(Expr::new(ExprKind::List(items), span))
                }
            }
            Tok::Op(_) | Tok::RParen | Tok::Comma => {
                Err(parse_error(span.start, "expected an operand"))
            }
        }
    }

    /// One or more comma-separated expressions.
    fn items(&mut self) -> Result<Vec<Expr>> {
        let mut items = vec![self.expr(0)?];
        while matches!(self.peek(), Some(Token { tok: Tok::Comma, .. })) {
            self.pos += 1;
            items.push(self.expr(0)?);
        }
        Ok(items)
    }

    fn call(&mut self, name_span: Span) -> Result<Expr> {
        let name = self.text(&name_span).to_string();
        self.pos += 1; // `(`
        let args = if matches!(self.peek(), Some(Token { tok: Tok::RParen, .. })) {
            Vec::new()
        } else {
            self.items()?
        };
        let close = self.expect_rparen()?;
        let mut end = close.span.end;

        let mut over = None;
        let has_over = matches!(
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)),
            (Some(Token { tok: Tok::Ident, span }), Some(Token { tok: Tok::LParen, .. }))
                if self.text(span).eq_ignore_ascii_case("OVER")
        );
        if has_over {
            self.pos += 1;
            let open = self.next()?;
            let close = self.skip_balanced()?;
            over = Some(
                self.source[open.span.end..close.span.start]
                    .trim()
                    .to_string(),
            );
            end = close.span.end;
        }

        Ok(Expr::new(
            ExprKind::Call { name, args, over },
            name_span.start..end,
        ))
    }

    /// Skip to the `)` closing an already-consumed `(`.
    fn skip_balanced(&mut self) -> Result<Token> {
        let mut depth = 1usize;
        loop {
            let token = self.next()?;
            match token.tok {
                Tok::LParen => depth += 1,
                Tok::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(token);
                    }
                }
                _ => {}
            }
        }
    }
}
