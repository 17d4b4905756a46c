//! 조건식 재귀 하강 파서
//!
//! 문법 (우선순위 낮은 순):
//!
//! ```text
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := sum (compare_op sum)*
//! sum        := term (("+" | "-") term)*
//! term       := factor (("*" | "/" | "%") factor)*
//! factor     := ("-" | "+") factor | power
//! power      := primary ("**" factor)?
//! primary    := NUMBER | STRING | True | False | None | PATH
//!             | "(" or ")" | "[" (or ("," or)* ","?)? "]"
//! ```
//!
//! 함수 호출(`PATH "("`)은 문법에 없으며 명시적으로 거부됩니다.

use super::eval::Value;
use super::lexer::{Spanned, Token, tokenize};

/// 허용하는 최대 중첩 깊이
const MAX_DEPTH: usize = 64;

/// 허용하는 최대 조건식 길이 (문자)
const MAX_EXPRESSION_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// 조건식 AST
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Path(Vec<String>),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// 연쇄 비교 (`a < b < c`는 `a < b and b < c`)
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
}

/// 조건식 문자열을 AST로 파싱합니다.
pub(crate) fn parse(source: &str) -> Result<Expr, String> {
    if source.chars().count() > MAX_EXPRESSION_LEN {
        return Err(format!(
            "expression too long (max {MAX_EXPRESSION_LEN} characters)"
        ));
    }

    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_owned());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;

    match parser.peek() {
        None => Ok(expr),
        Some(spanned) => Err(format!(
            "unexpected token '{}' at {}",
            spanned.token, spanned.offset
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        match self.advance() {
            Some(spanned) if &spanned.token == token => Ok(()),
            Some(spanned) => Err(format!(
                "expected '{token}' but found '{}' at {}",
                spanned.token, spanned.offset
            )),
            None => Err(format!("expected '{token}' but reached end of expression")),
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("expression nested too deeply (max {MAX_DEPTH})"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.enter()?;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.leave();
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let first = self.parse_sum()?;
        let mut chain = Vec::new();

        while let Some(op) = self.compare_op() {
            let rhs = self.parse_sum()?;
            chain.push((op, rhs));
        }

        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    /// 비교 연산자를 소비하고 반환합니다. `not in`은 두 토큰을 소비합니다.
    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek_token()? {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::In => CompareOp::In,
            Token::Not if self.peek_nth(1) == Some(&Token::In) => {
                self.pos += 2;
                return Some(CompareOp::NotIn);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_sum(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, String> {
        let op = match self.peek_token() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.parse_factor()?;
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Pow) {
            // 우결합: 2 ** 3 ** 2 == 2 ** 9
            self.enter()?;
            let exponent = self.parse_factor()?;
            self.leave();
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let Some(spanned) = self.advance() else {
            return Err("unexpected end of expression".to_owned());
        };

        match spanned.token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Path(segments) => {
                if self.peek_token() == Some(&Token::LParen) {
                    return Err(format!(
                        "function calls are not supported ('{}' at {})",
                        segments.join("."),
                        spanned.offset
                    ));
                }
                Ok(Expr::Path(segments))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_list(),
            other => Err(format!("unexpected token '{other}' at {}", spanned.offset)),
        }
    }

    fn parse_list(&mut self) -> Result<Expr, String> {
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(Expr::List(items));
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat(&Token::Comma) {
                if self.eat(&Token::RBracket) {
                    break;
                }
                continue;
            }
            self.expect(&Token::RBracket)?;
            break;
        }
        Ok(Expr::List(items))
    }
}
