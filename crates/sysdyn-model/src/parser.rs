//! Hand-written recursive descent parser for equation right-hand sides.
//!
//! Precedence, loosest to tightest:
//! `OR` < `AND` < `NOT` < comparison < `+ -` < `* /` < unary `-` < `^` < atom.
//! `^` is right-associative; comparisons do not chain.
//!
//! Vensim multi-word names arrive as adjacent identifier tokens (the lexer
//! skips whitespace), so the atom parser merges runs of identifiers into a
//! single reference before canonicalization.

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::expr::{BinaryOp, Builtin, Expr, UnaryOp};
use sysdyn_common::names::canonical;

use crate::lexer::{tokenize, Token};

/// A parsed equation right-hand side. `INTEG(net, init)` is only legal as
/// the outermost operation and produces a stock.
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Stock { net_flow: Expr, initial: Expr },
    Expr(Expr),
}

/// Parse a full equation right-hand side, stock form included.
pub fn parse_rhs(src: &str) -> Result<Rhs> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0, src };
    if parser.peek() == Some(&Token::Integ) {
        parser.advance();
        parser.expect(&Token::LParen, "`(` after INTEG")?;
        let net_flow = parser.expression()?;
        parser.expect(&Token::Comma, "`,` between INTEG arguments")?;
        let initial = parser.expression()?;
        parser.expect(&Token::RParen, "`)` closing INTEG")?;
        parser.expect_end()?;
        return Ok(Rhs::Stock { net_flow, initial });
    }
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(Rhs::Expr(expr))
}

/// Parse a plain expression (no stock form).
pub fn parse_expression(src: &str) -> Result<Expr> {
    match parse_rhs(src)? {
        Rhs::Expr(expr) => Ok(expr),
        Rhs::Stock { .. } => Err(SdError::Parse(format!(
            "INTEG(...) is not valid here: `{}`",
            src.trim()
        ))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn error(&self, message: &str) -> SdError {
        SdError::Parse(format!(
            "{message} at token {} in `{}`",
            self.pos,
            self.src.trim()
        ))
    }

    // or_expr := and_expr (OR and_expr)*
    fn expression(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            let inner = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    // comparison := additive ((=|<>|<|<=|>|>=) additive)?
    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    // power := atom (^ unary)?   — right-associative
    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.eat(&Token::Caret) {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Num(value)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::IfThenElse) => self.call(Builtin::IfThenElse),
            Some(Token::Integ) => Err(self.error(
                "INTEG(...) is only supported as the outermost operation of an equation",
            )),
            Some(Token::Quoted(name)) => self.reference(canonical(&name)),
            Some(Token::Ident(first)) => {
                // Merge adjacent identifiers into one multi-word name
                let mut words = vec![first];
                while let Some(Token::Ident(word)) = self.peek() {
                    words.push(word.clone());
                    self.advance();
                }
                self.reference(canonical(&words.join(" ")))
            }
            _ => Err(self.error("expected a number, name or `(`")),
        }
    }

    /// A canonical name in value position: builtin call, clock, or variable.
    fn reference(&mut self, name: String) -> Result<Expr> {
        if self.peek() == Some(&Token::LParen) {
            return match Builtin::from_name(&name) {
                Some(builtin) => self.call(builtin),
                None => Err(self.error(&format!(
                    "unsupported or unknown function `{name}` (lookups, macros and subscripts are not supported)"
                ))),
            };
        }
        if name == "time" {
            return Ok(Expr::Time);
        }
        Ok(Expr::Var(name))
    }

    fn call(&mut self, builtin: Builtin) -> Result<Expr> {
        self.expect(&Token::LParen, &format!("`(` after {}", builtin.name()))?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, &format!("`)` closing {}", builtin.name()))?;
        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(&format!(
                "{} takes {} argument(s), got {}",
                builtin.name(),
                if min == max { min.to_string() } else { format!("{min}..{max}") },
                args.len()
            )));
        }
        Ok(Expr::Call(builtin, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_associativity() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Num(2.0)),
                    Box::new(Expr::Num(3.0)),
                )),
            )
        );
        // right-associative power: 2^3^2 = 2^(3^2)
        let expr = parse_expression("2 ^ 3 ^ 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Num(2.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    Box::new(Expr::Num(3.0)),
                    Box::new(Expr::Num(2.0)),
                )),
            )
        );
    }

    #[test]
    fn multi_word_names_merge() {
        let expr = parse_expression("Birth Rate * Population").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Mul,
                Box::new(Expr::Var("birth_rate".into())),
                Box::new(Expr::Var("population".into())),
            )
        );
    }

    #[test]
    fn stock_form_at_top_level_only() {
        let rhs = parse_rhs("INTEG(births - deaths, 1000)").unwrap();
        assert_eq!(
            rhs,
            Rhs::Stock {
                net_flow: Expr::Binary(
                    BinaryOp::Sub,
                    Box::new(Expr::Var("births".into())),
                    Box::new(Expr::Var("deaths".into())),
                ),
                initial: Expr::Num(1000.0),
            }
        );
        assert!(parse_rhs("1 + INTEG(x, 0)").is_err());
    }

    #[test]
    fn builtins_and_arity() {
        let expr = parse_expression("MIN(a, b) + STEP(10, 5)").unwrap();
        match expr {
            Expr::Binary(BinaryOp::Add, lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Call(Builtin::Min, _)));
                assert!(matches!(*rhs, Expr::Call(Builtin::Step, _)));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(parse_expression("MIN(a)").is_err());
        assert!(parse_expression("SQRT(a, b)").is_err());
    }

    #[test]
    fn conditional_function() {
        let expr = parse_expression("IF THEN ELSE(Time > 5, 1, 0)").unwrap();
        match expr {
            Expr::Call(Builtin::IfThenElse, args) => {
                assert_eq!(args.len(), 3);
                assert!(matches!(
                    args[0],
                    Expr::Binary(BinaryOp::Gt, _, _)
                ));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn time_is_the_clock() {
        assert_eq!(parse_expression("Time").unwrap(), Expr::Time);
        assert_eq!(parse_expression("TIME + 1").unwrap(),
            Expr::Binary(BinaryOp::Add, Box::new(Expr::Time), Box::new(Expr::Num(1.0))));
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = parse_expression("LOOKUP FORECAST(x, 3)").unwrap_err();
        assert!(err.to_string().contains("lookup_forecast"));
    }

    #[test]
    fn logic_operators() {
        let expr = parse_expression("a > 1 :AND: :NOT: (b < 2) :OR: c = 3").unwrap();
        // OR binds loosest
        assert!(matches!(expr, Expr::Binary(BinaryOp::Or, _, _)));
    }

    #[test]
    fn trailing_input_rejected() {
        assert!(parse_expression("1 + 2 3").is_err());
    }
}
