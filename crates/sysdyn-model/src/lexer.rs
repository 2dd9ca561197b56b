//! Lexical analysis for the equation language using logos.
//!
//! Both dialects share one token set: Vensim's wordy logical operators
//! (`:AND:`) and XMILE's bare keywords (`AND`) lex to the same tokens.
//! Comments never reach the lexer; the file readers strip them.

use logos::Logos;

use sysdyn_common::error::{Result, SdError};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Vensim quoted variable name, quotes stripped.
    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    Quoted(String),

    /// Vensim spells the conditional as a function whose name contains
    /// spaces; XMILE sources usually write `IF_THEN_ELSE`.
    #[regex(r"IF[ _]THEN[ _]ELSE", ignore(ascii_case))]
    IfThenElse,

    /// Stock declaration; only legal as the outermost call of an equation.
    #[token("INTEG", ignore(ascii_case))]
    Integ,

    #[token(":AND:", ignore(ascii_case))]
    #[token("AND", ignore(ascii_case))]
    And,

    #[token(":OR:", ignore(ascii_case))]
    #[token("OR", ignore(ascii_case))]
    Or,

    #[token(":NOT:", ignore(ascii_case))]
    #[token("NOT", ignore(ascii_case))]
    Not,

    #[regex(r"[A-Za-z_][A-Za-z0-9_'$]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Eq,
    #[token("<>")]
    Ne,
    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token(">=")]
    Ge,
    #[token(">")]
    Gt,
}

/// Tokenize an expression, reporting the byte offset of the first
/// unrecognized input.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(src);
    while let Some(item) = lexer.next() {
        match item {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(SdError::Parse(format!(
                    "unexpected input `{}` at byte {} of expression `{}`",
                    lexer.slice(),
                    lexer.span().start,
                    src.trim()
                )))
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_operators() {
        let tokens = tokenize("1.5 + x * 2e3").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.5),
                Token::Plus,
                Token::Ident("x".into()),
                Token::Star,
                Token::Number(2000.0),
            ]
        );
    }

    #[test]
    fn vensim_and_xmile_logic_share_tokens() {
        assert_eq!(tokenize("a :AND: b").unwrap()[1], Token::And);
        assert_eq!(tokenize("a AND b").unwrap()[1], Token::And);
        assert_eq!(tokenize(":NOT: a").unwrap()[0], Token::Not);
    }

    #[test]
    fn integ_and_conditional_keywords() {
        assert_eq!(tokenize("INTEG(x, 1)").unwrap()[0], Token::Integ);
        assert_eq!(tokenize("integ(x, 1)").unwrap()[0], Token::Integ);
        assert_eq!(tokenize("IF THEN ELSE(a, b, c)").unwrap()[0], Token::IfThenElse);
        assert_eq!(tokenize("if_then_else(a, b, c)").unwrap()[0], Token::IfThenElse);
    }

    #[test]
    fn keywords_do_not_swallow_longer_idents() {
        // INTEGER is the truncation builtin, not the INTEG keyword
        assert_eq!(tokenize("INTEGER(x)").unwrap()[0], Token::Ident("INTEGER".into()));
        assert_eq!(tokenize("android").unwrap()[0], Token::Ident("android".into()));
    }

    #[test]
    fn quoted_names() {
        assert_eq!(
            tokenize(r#""net growth" * 2"#).unwrap()[0],
            Token::Quoted("net growth".into())
        );
    }

    #[test]
    fn comparison_operators_longest_match() {
        let tokens = tokenize("a <= b <> c").unwrap();
        assert_eq!(tokens[1], Token::Le);
        assert_eq!(tokens[3], Token::Ne);
    }

    #[test]
    fn rejects_garbage() {
        assert!(tokenize("a ; b").is_err());
    }
}
