use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::{Expr, Node};
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken { found: Token, expected: String },
    #[error("Missing closing parenthesis")]
    MissingClosingParen(Span), // Span of the unclosed opening paren
    #[error("Empty expression")]
    EmptyInput,
    #[error("{0}")]
    LexerError(#[from] LexerError), // Propagate lexer errors when parsing from a string
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses the entire token sequence as one top-level expression.
    ///
    /// The sequence must begin with `(`: a program is always a single
    /// parenthesized form (typically a `(begin ...)` wrapping everything).
    /// Tokens left over after that form are an error.
    pub fn parse(mut self) -> ParseResult<Node> {
        match self.next_token() {
            None => Err(ParseError::EmptyInput),
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => {
                let node = self.parse_list(span)?;
                if let Some(found) = self.next_token() {
                    Err(ParseError::UnexpectedToken {
                        found,
                        expected: "end of input".to_string(),
                    })
                } else {
                    Ok(node)
                }
            }
            Some(found) => Err(ParseError::UnexpectedToken {
                found,
                expected: "'('".to_string(),
            }),
        }
    }

    /// Parses a single expression of any shape. Used by `parse` for list
    /// elements; exposed for callers that want to read bare atoms.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let token = self.next_token().ok_or(ParseError::EmptyInput)?;
        self.parse_expr_with_token(token)
    }

    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Node> {
        match token {
            Token {
                kind: TokenKind::LParen,
                span,
            } => self.parse_list(span),
            Token {
                kind: TokenKind::RParen,
                ..
            } => Err(ParseError::UnexpectedToken {
                found: token,
                expected: "an atom or '('".to_string(),
            }),
            atom => Self::parse_atom(atom),
        }
    }

    /// Parses the remainder of a list whose `(` has already been consumed.
    fn parse_list(&mut self, lparen_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                }) => {
                    return Ok(Node::new_list(elements, lparen_span.merge(rparen_span)));
                }
                Some(token) => elements.push(self.parse_expr_with_token(token)?),
                None => return Err(ParseError::MissingClosingParen(lparen_span)),
            }
        }
    }

    /// Parses an atomic expression (integer, float, string, symbol).
    fn parse_atom(token: Token) -> ParseResult<Node> {
        let span = token.span;
        Ok(Node::new(
            match token.kind {
                TokenKind::Integer(n) => Expr::Integer(n),
                TokenKind::Float(n) => Expr::Float(n),
                TokenKind::Str(s) => Expr::Str(s),
                TokenKind::Symbol(s) => Expr::Symbol(s),
                other_kind => Err(ParseError::UnexpectedToken {
                    found: Token {
                        kind: other_kind,
                        span,
                    },
                    expected: "an atom (integer, float, string, symbol)".to_string(),
                })?,
            },
            span,
        ))
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}
