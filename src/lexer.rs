//! Lexer for C++-style matrix source using logos
//!
//! Only the handful of tokens needed to recognize matrix declarations and
//! matrix statements are modelled. Anything else (string literals, `#`
//! directives, stray operators) comes out as a lexer error, which the
//! permissive parser simply skips.

use logos::Logos;

/// Token types for matrix source files
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    #[token("Matrix")]
    Matrix,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    Integer(u64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("=")]
    Equals,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    /// Not used by any rule; keeps `a.b` from lexing as a gap
    #[token(".")]
    Dot,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Matrix => write!(f, "Matrix"),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Equals => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Dot => write!(f, "."),
        }
    }
}

/// Tokenize a source file.
///
/// Unrecognized input is replaced by `None` so that pattern matching in the
/// parser never bridges across it.
pub fn tokenize(source: &str) -> Vec<Option<Token>> {
    Token::lexer(source).map(Result::ok).collect()
}
