use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

/// Token kinds for the minilisp dialect.
///
/// Strings are delimited by single quotes and may contain anything except a
/// quote, including whitespace and unbalanced parentheses. There are no
/// escape sequences. Integer classification is tried before float, so `3`
/// lexes as an integer and `3.0` as a float; any word failing both is a
/// symbol.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[+-]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 5)]
    Integer(i64),
    #[regex(r"[+-]?(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?|[+-]?[0-9]+[eE][-+]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 5)]
    Float(f64),
    #[regex(r"'[^']*'?", |lex| {
        let slice = lex.slice();
        // The regex accepts an unterminated run so we can report it instead
        // of silently swallowing the rest of the input.
        if slice.len() < 2 || !slice.ends_with('\'') {
            return Err(LexerErrorKind::UnterminatedString);
        }
        Ok(slice[1..slice.len() - 1].to_string())
    })]
    Str(String),
    #[regex(r"[^ \t\n\r()']+", |lex| lex.slice().to_string(), priority = 1)]
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "'{}'", s), // Display with quotes for clarity
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

// Helper function to tokenize a string directly (useful for tests and parser)
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: Span {
                    start: range.start,
                    end: range.end,
                },
            }),
            Err(error) => Err(LexerError {
                error,
                span: Span {
                    start: range.start,
                    end: range.end,
                },
            }),
        })
        .collect()
}
