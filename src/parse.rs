//! Formula parser.
//!
//! Grammar surface: one expression statement over named fields with binary
//! `+ - * / // % ** | & ^`, unary `- + ~ not`, comparisons (chained
//! comparisons decompose into a conjunction), membership against a literal
//! finite set, boolean `and`/`or`, and calls into the registered function
//! table. Construction and normalization are fused: every binary operator
//! site immediately routes through the ring or logical normalizer, so the
//! returned tree is already canonical.

use crate::algebra;
use crate::error::ExpressionError;
use crate::expr::{Cmp, Expr, Value};
use crate::logic;
use crate::registry::FunctionRegistry;
use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::str::Chars;

/// Parses one formula into a normalized expression tree.
///
/// `defs` supplies named sub-definitions, themselves formulas, resolved
/// recursively wherever the name appears; a definition that reaches itself
/// fails with [`ExpressionError::DefinitionCycle`].
pub fn parse(
    source: &str,
    registry: &FunctionRegistry,
    defs: &BTreeMap<String, String>,
) -> Result<Expr, ExpressionError> {
    let mut ctx = ParseCtx {
        registry,
        defs,
        cache: HashMap::new(),
        stack: Vec::new(),
    };
    parse_source(&mut ctx, source)
}

struct ParseCtx<'a> {
    registry: &'a FunctionRegistry,
    defs: &'a BTreeMap<String, String>,
    /// Resolved sub-definitions, keyed by name. A definition used by several
    /// formulas in one parse parses once.
    cache: HashMap<String, Expr>,
    /// Definition names currently being resolved, for cycle detection.
    stack: Vec<String>,
}

fn parse_source(ctx: &mut ParseCtx<'_>, source: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser {
        source,
        lexer: Lexer::new(source),
        lookahead: None,
        ctx,
    };
    let expr = parser.parse_or()?;
    match parser.next_token()? {
        Token::Eof => Ok(expr),
        other => Err(ExpressionError::invalid(
            source,
            format!("unexpected trailing token: {other:?}"),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eof,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        self.skip_ws();
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        match ch {
            '+' => {
                self.chars.next();
                Ok(Token::Plus)
            }
            '-' => {
                self.chars.next();
                Ok(Token::Minus)
            }
            '*' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('*')) {
                    self.chars.next();
                    Ok(Token::StarStar)
                } else {
                    Ok(Token::Star)
                }
            }
            '/' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('/')) {
                    self.chars.next();
                    Ok(Token::SlashSlash)
                } else {
                    Ok(Token::Slash)
                }
            }
            '%' => {
                self.chars.next();
                Ok(Token::Percent)
            }
            '&' => {
                self.chars.next();
                Ok(Token::Amp)
            }
            '|' => {
                self.chars.next();
                Ok(Token::Pipe)
            }
            '^' => {
                self.chars.next();
                Ok(Token::Caret)
            }
            '~' => {
                self.chars.next();
                Ok(Token::Tilde)
            }
            '<' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('=')) {
                    self.chars.next();
                    Ok(Token::Le)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('=')) {
                    self.chars.next();
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            '!' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('=')) {
                    self.chars.next();
                    Ok(Token::NotEq)
                } else {
                    Err(ExpressionError::invalid(
                        "!",
                        "unexpected character `!` (did you mean `!=`?)",
                    ))
                }
            }
            '=' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some('=')) {
                    self.chars.next();
                    Ok(Token::EqEq)
                } else {
                    Err(ExpressionError::invalid(
                        "=",
                        "assignment is not an expression (did you mean `==`?)",
                    ))
                }
            }
            '(' => {
                self.chars.next();
                Ok(Token::LParen)
            }
            ')' => {
                self.chars.next();
                Ok(Token::RParen)
            }
            '{' => {
                self.chars.next();
                Ok(Token::LBrace)
            }
            '}' => {
                self.chars.next();
                Ok(Token::RBrace)
            }
            '[' => {
                self.chars.next();
                Ok(Token::LBracket)
            }
            ']' => {
                self.chars.next();
                Ok(Token::RBracket)
            }
            ',' => {
                self.chars.next();
                Ok(Token::Comma)
            }
            '"' | '\'' => self.read_string(ch),
            c if is_ident_start(c) => Ok(Token::Ident(self.read_ident())),
            c if c.is_ascii_digit() || c == '.' => {
                let raw = self.read_number();
                let num = raw.parse::<f64>().map_err(|_| {
                    ExpressionError::invalid(&raw, format!("invalid number `{raw}`"))
                })?;
                Ok(Token::Number(num))
            }
            other => Err(ExpressionError::invalid(
                &other.to_string(),
                format!("unexpected character `{other}`"),
            )),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.chars.next();
        }
    }

    fn read_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn read_number(&mut self) -> String {
        let mut out = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.chars.next();
                continue;
            }
            if c == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                out.push(c);
                self.chars.next();
                continue;
            }
            if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                out.push(c);
                self.chars.next();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        out.push(sign);
                        self.chars.next();
                    }
                }
                continue;
            }
            break;
        }
        out
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ExpressionError> {
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => return Ok(Token::Str(out)),
                Some(c) => out.push(c),
                None => {
                    return Err(ExpressionError::invalid(
                        &out,
                        "unterminated string literal",
                    ))
                }
            }
        }
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

struct Parser<'a, 'c> {
    source: &'a str,
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
    ctx: &'a mut ParseCtx<'c>,
}

impl Parser<'_, '_> {
    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        if let Some(tok) = self.lookahead.take() {
            return Ok(tok);
        }
        self.lexer.next_token()
    }

    fn peek_token(&mut self) -> Result<&Token, ExpressionError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().expect("lookahead just initialized"))
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let got = self.next_token()?;
        if got == expected {
            Ok(())
        } else {
            Err(ExpressionError::invalid(
                self.source,
                format!("expected {expected:?}, got {got:?}"),
            ))
        }
    }

    fn peek_keyword(&mut self, kw: &str) -> Result<bool, ExpressionError> {
        Ok(matches!(self.peek_token()?, Token::Ident(name) if name == kw))
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while self.peek_keyword("or")? {
            self.next_token()?;
            let rhs = self.parse_and()?;
            lhs = logic::or(self.to_bool(lhs, "`or` operand")?, self.to_bool(rhs, "`or` operand")?);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_not()?;
        while self.peek_keyword("and")? {
            self.next_token()?;
            let rhs = self.parse_not()?;
            lhs = logic::and(
                self.to_bool(lhs, "`and` operand")?,
                self.to_bool(rhs, "`and` operand")?,
            );
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek_keyword("not")? {
            self.next_token()?;
            let inner = self.parse_not()?;
            let inner = self.to_bool(inner, "`not` operand")?;
            return Ok(logic::negate(inner));
        }
        self.parse_comparison()
    }

    /// Comparison chains decompose into a conjunction: `a < b < c` parses as
    /// `a < b and b < c`. Membership tests cannot participate in a chain.
    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_bitor()?;
        let mut operands = vec![first];
        let mut ops: Vec<RawCmp> = Vec::new();
        loop {
            let op = match self.peek_token()? {
                Token::Lt => RawCmp::Lt,
                Token::Le => RawCmp::Le,
                Token::Gt => RawCmp::Gt,
                Token::Ge => RawCmp::Ge,
                Token::EqEq => RawCmp::Eq,
                Token::NotEq => RawCmp::Ne,
                Token::Ident(name) if name == "in" => RawCmp::In,
                Token::Ident(name) if name == "not" => {
                    self.next_token()?;
                    if !self.peek_keyword("in")? {
                        return Err(ExpressionError::invalid(
                            self.source,
                            "`not` after an expression must be `not in`",
                        ));
                    }
                    RawCmp::NotIn
                }
                _ => break,
            };
            self.next_token()?;
            operands.push(self.parse_bitor()?);
            ops.push(op);
        }
        if ops.is_empty() {
            let mut operands = operands;
            return Ok(operands.pop().expect("chain is never empty"));
        }
        if ops.len() > 1 && ops.iter().any(|o| matches!(o, RawCmp::In | RawCmp::NotIn)) {
            return Err(ExpressionError::invalid(
                self.source,
                "membership tests cannot be chained with other comparisons",
            ));
        }
        let mut out: Option<Expr> = None;
        for (idx, op) in ops.into_iter().enumerate() {
            let left = operands[idx].clone();
            let right = operands[idx + 1].clone();
            // a > b is b < a
            let (cmp, left, right) = match op {
                RawCmp::Lt => (Cmp::Lt, left, right),
                RawCmp::Le => (Cmp::Le, left, right),
                RawCmp::Gt => (Cmp::Lt, right, left),
                RawCmp::Ge => (Cmp::Le, right, left),
                RawCmp::Eq => (Cmp::Eq, left, right),
                RawCmp::Ne => (Cmp::Ne, left, right),
                RawCmp::In => (Cmp::In, left, right),
                RawCmp::NotIn => (Cmp::NotIn, left, right),
            };
            let rel = self.make_relation(cmp, left, right)?;
            out = Some(match out {
                Some(acc) => logic::and(acc, rel),
                None => rel,
            });
        }
        Ok(out.expect("ops is non-empty"))
    }

    fn parse_bitor(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_bitxor()?;
        while matches!(self.peek_token()?, Token::Pipe) {
            self.next_token()?;
            let rhs = self.parse_bitxor()?;
            lhs = self.bit_combine(BitOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_bitand()?;
        while matches!(self.peek_token()?, Token::Caret) {
            self.next_token()?;
            let rhs = self.parse_bitand()?;
            lhs = self.bit_combine(BitOp::Xor, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_add_sub()?;
        while matches!(self.peek_token()?, Token::Amp) {
            self.next_token()?;
            let rhs = self.parse_add_sub()?;
            lhs = self.bit_combine(BitOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    /// `& | ^` route by operand type: two boolean operands combine on the
    /// logical ring, two arithmetic operands become a bitwise primitive call
    /// (constant-folded over unsigned integers), a mix is rejected.
    fn bit_combine(&self, op: BitOp, lhs: Expr, rhs: Expr) -> Result<Expr, ExpressionError> {
        match (lhs.is_logical(), rhs.is_logical()) {
            (true, true) => Ok(match op {
                BitOp::And => logic::and(lhs, rhs),
                BitOp::Or => logic::or(lhs, rhs),
                BitOp::Xor => logic::xor(lhs, rhs),
            }),
            (false, false) => {
                if let (Some(a), Some(b)) = (lhs.const_number(), rhs.const_number()) {
                    let (ua, ub) = (as_unsigned(self.source, a)?, as_unsigned(self.source, b)?);
                    let folded = match op {
                        BitOp::And => ua & ub,
                        BitOp::Or => ua | ub,
                        BitOp::Xor => ua ^ ub,
                    };
                    return Ok(Expr::number(folded as f64));
                }
                Ok(Expr::call(op.primitive(), vec![lhs, rhs]))
            }
            _ => Err(ExpressionError::invalid(
                self.source,
                format!(
                    "`{}` requires both operands boolean or both arithmetic",
                    op.symbol()
                ),
            )),
        }
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_mul_div()?;
        loop {
            let subtract = match self.peek_token()? {
                Token::Plus => false,
                Token::Minus => true,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_mul_div()?;
            let lhs_a = self.to_arith(lhs, "additive operand")?;
            let rhs_a = self.to_arith(rhs, "additive operand")?;
            lhs = if subtract {
                algebra::sub(lhs_a, rhs_a)
            } else {
                algebra::add(lhs_a, rhs_a)
            };
        }
        Ok(lhs)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_token()? {
                Token::Star => MulOp::Mul,
                Token::Slash => MulOp::Div,
                Token::SlashSlash => MulOp::FloorDiv,
                Token::Percent => MulOp::Mod,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_unary()?;
            let lhs_a = self.to_arith(lhs, "multiplicative operand")?;
            let rhs_a = self.to_arith(rhs, "multiplicative operand")?;
            lhs = match op {
                MulOp::Mul => algebra::mul(lhs_a, rhs_a),
                MulOp::Div => algebra::div(lhs_a, rhs_a)?,
                MulOp::FloorDiv => self.euclidean(lhs_a, rhs_a, "floordiv")?,
                MulOp::Mod => self.euclidean(lhs_a, rhs_a, "mod")?,
            };
        }
        Ok(lhs)
    }

    /// `//` and `%` stay primitive calls; constant operands fold with
    /// floored-division semantics.
    fn euclidean(&self, lhs: Expr, rhs: Expr, func: &str) -> Result<Expr, ExpressionError> {
        if let (Some(a), Some(b)) = (lhs.const_number(), rhs.const_number()) {
            if b == 0.0 {
                return Err(ExpressionError::invalid(
                    self.source,
                    "division by constant zero",
                ));
            }
            let quotient = (a / b).floor();
            return Ok(Expr::number(if func == "floordiv" {
                quotient
            } else {
                a - b * quotient
            }));
        }
        Ok(Expr::call(func, vec![lhs, rhs]))
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek_token()? {
            Token::Plus => {
                self.next_token()?;
                let inner = self.parse_unary()?;
                self.to_arith(inner, "unary `+` operand")
            }
            Token::Minus => {
                self.next_token()?;
                let inner = self.parse_unary()?;
                let inner = self.to_arith(inner, "unary `-` operand")?;
                Ok(algebra::negate(inner))
            }
            Token::Tilde => {
                self.next_token()?;
                let inner = self.parse_unary()?;
                let inner = self.to_bool(inner, "`~` operand")?;
                Ok(logic::negate(inner))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_atom()?;
        if matches!(self.peek_token()?, Token::StarStar) {
            self.next_token()?;
            // Right-associative, and the exponent may carry a unary sign.
            let exponent = self.parse_unary()?;
            let base = self.to_arith(base, "power base")?;
            let exponent = self.to_arith(exponent, "power exponent")?;
            return algebra::pow(base, exponent);
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ExpressionError> {
        match self.next_token()? {
            Token::Number(value) => Ok(Expr::number(value)),
            Token::Str(value) => Ok(Expr::Const(Value::Str(value))),
            Token::Ident(name) => {
                if matches!(name.as_str(), "and" | "or" | "not" | "in") {
                    return Err(ExpressionError::invalid(
                        self.source,
                        format!("unexpected keyword `{name}`"),
                    ));
                }
                if matches!(self.peek_token()?, Token::LParen) {
                    self.next_token()?;
                    let args = self.parse_call_args()?;
                    self.expect_token(Token::RParen)?;
                    return self.make_call(&name, args);
                }
                self.resolve_name(&name)
            }
            Token::LParen => {
                let expr = self.parse_or()?;
                self.expect_token(Token::RParen)?;
                Ok(expr)
            }
            Token::LBrace => self.parse_set_literal(Token::RBrace),
            Token::LBracket => self.parse_set_literal(Token::RBracket),
            other => Err(ExpressionError::invalid(
                self.source,
                format!("unexpected token: {other:?}"),
            )),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if matches!(self.peek_token()?, Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek_token()? {
                Token::Comma => {
                    self.next_token()?;
                }
                Token::RParen => break,
                other => {
                    let other = other.clone();
                    return Err(ExpressionError::invalid(
                        self.source,
                        format!("invalid token in argument list: {other:?}"),
                    ))
                }
            }
        }
        Ok(args)
    }

    fn make_call(&mut self, name: &str, args: Vec<Expr>) -> Result<Expr, ExpressionError> {
        let meta = self
            .ctx
            .registry
            .get(name)
            .ok_or_else(|| ExpressionError::UnknownFunction {
                name: name.to_string(),
            })?;
        if !meta.arity.accepts(args.len()) {
            return Err(ExpressionError::InvalidArity {
                name: name.to_string(),
                expected: meta.arity.describe(),
                actual: args.len(),
            });
        }
        for arg in &args {
            if arg.is_logical() {
                return Err(ExpressionError::invalid(
                    &arg.to_string(),
                    format!("boolean argument to function `{name}`"),
                ));
            }
        }
        if let Some(fold) = meta.fold {
            let constants: Option<Vec<f64>> = args.iter().map(Expr::const_number).collect();
            if let Some(values) = constants {
                return Ok(Expr::number(fold(&values)));
            }
        }
        Ok(Expr::call(meta.name, args))
    }

    /// Bare identifier resolution order: caller-supplied sub-definitions,
    /// then named constants, then an external field reference.
    fn resolve_name(&mut self, name: &str) -> Result<Expr, ExpressionError> {
        if let Some(resolved) = self.ctx.cache.get(name) {
            return Ok(resolved.clone());
        }
        if let Some(def_source) = self.ctx.defs.get(name) {
            if self.ctx.stack.iter().any(|n| n == name) {
                return Err(ExpressionError::DefinitionCycle {
                    name: name.to_string(),
                });
            }
            let def_source = def_source.clone();
            self.ctx.stack.push(name.to_string());
            let resolved = parse_source(self.ctx, &def_source)?;
            self.ctx.stack.pop();
            self.ctx.cache.insert(name.to_string(), resolved.clone());
            return Ok(resolved);
        }
        Ok(match name {
            "pi" => Expr::number(std::f64::consts::PI),
            "e" => Expr::number(std::f64::consts::E),
            "inf" => Expr::number(f64::INFINITY),
            "nan" => Expr::number(f64::NAN),
            _ => Expr::name(name),
        })
    }

    fn parse_set_literal(&mut self, close: Token) -> Result<Expr, ExpressionError> {
        let mut items = Vec::new();
        if *self.peek_token()? != close {
            loop {
                let item = self.parse_or()?;
                match item {
                    Expr::Const(value) => items.push(value),
                    other => {
                        return Err(ExpressionError::NotConstantCollection {
                            expr: other.to_string(),
                        })
                    }
                }
                match self.peek_token()? {
                    Token::Comma => {
                        self.next_token()?;
                    }
                    tok if *tok == close => break,
                    other => {
                        let other = other.clone();
                        return Err(ExpressionError::invalid(
                            self.source,
                            format!("invalid token in collection literal: {other:?}"),
                        ))
                    }
                }
            }
        }
        self.expect_token(close)?;
        Ok(Expr::Const(Value::set(items)))
    }

    fn make_relation(&self, cmp: Cmp, left: Expr, right: Expr) -> Result<Expr, ExpressionError> {
        if left.is_logical() || right.is_logical() {
            return Err(ExpressionError::invalid(
                self.source,
                "comparison operand is itself a boolean expression",
            ));
        }
        match cmp {
            Cmp::In | Cmp::NotIn => {
                let Expr::Const(Value::Set(items)) = &right else {
                    return Err(ExpressionError::NotConstantCollection {
                        expr: right.to_string(),
                    });
                };
                if let Expr::Const(value) = &left {
                    let found = items.binary_search(value).is_ok();
                    return Ok(Expr::boolean(found == (cmp == Cmp::In)));
                }
                Ok(Expr::Relation {
                    cmp,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Cmp::Lt | Cmp::Le => {
                if let (Some(a), Some(b)) = (left.const_number(), right.const_number()) {
                    return Ok(Expr::boolean(if cmp == Cmp::Lt { a < b } else { a <= b }));
                }
                Ok(Expr::Relation {
                    cmp,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Cmp::Eq | Cmp::Ne => {
                if let (Expr::Const(a), Expr::Const(b)) = (&left, &right) {
                    return Ok(Expr::boolean((a == b) == (cmp == Cmp::Eq)));
                }
                // Symmetric operators sort their operands, so the constant
                // side is canonicalized.
                let (left, right) = if left <= right {
                    (left, right)
                } else {
                    (right, left)
                };
                Ok(Expr::Relation {
                    cmp,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
        }
    }

    /// Boolean coercion: a bare field name in a boolean position becomes a
    /// positive predicate.
    fn to_bool(&self, e: Expr, context: &'static str) -> Result<Expr, ExpressionError> {
        match e {
            Expr::Name(name) => Ok(Expr::predicate(name)),
            e if e.is_logical() => Ok(e),
            other => Err(ExpressionError::NotBoolean {
                expr: other.to_string(),
                context,
            }),
        }
    }

    fn to_arith(&self, e: Expr, context: &'static str) -> Result<Expr, ExpressionError> {
        if e.is_logical() {
            return Err(ExpressionError::invalid(
                &e.to_string(),
                format!("boolean expression used as {context}"),
            ));
        }
        Ok(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    fn primitive(self) -> &'static str {
        match self {
            Self::And => "bitand",
            Self::Or => "bitor",
            Self::Xor => "bitxor",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MulOp {
    Mul,
    Div,
    FloorDiv,
    Mod,
}

/// Surface comparison operators before `>`/`>=` rewrite into their
/// swapped-operand `<`/`<=` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawCmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    In,
    NotIn,
}

fn as_unsigned(source: &str, value: f64) -> Result<u64, ExpressionError> {
    if value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(ExpressionError::invalid(
            source,
            format!("bitwise operand `{value}` is not an unsigned integer"),
        ))
    }
}
