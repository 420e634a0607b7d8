//! Permissive parser for C++-style matrix source
//!
//! Recognizes, anywhere in the token stream:
//! - `Matrix A(3, 4)` and `Matrix<int> A(3, 4)` declarations
//! - `C = A * B;`, `C = A + B;`, `C = A - B;` statements
//! - `B = transpose(A);` statements
//!
//! Everything else is skipped, so a complete C++ translation unit can be fed
//! in and only the matrix program is extracted.

use crate::ast::{Declaration, OperationKind, SourceUnit, Statement};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{tokenize, Token};

/// Parser for matrix source files
pub struct Parser {
    tokens: Vec<Option<Token>>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
        }
    }

    /// Token at `pos + ahead`, if it exists and was recognized
    fn peek(&self, ahead: usize) -> Option<&Token> {
        self.tokens
            .get(self.pos + ahead)
            .and_then(|t| t.as_ref())
    }

    fn ident(&self, ahead: usize) -> Option<String> {
        match self.peek(ahead) {
            Some(Token::Ident(name)) => Some(name.clone()),
            _ => None,
        }
    }

    fn integer(&self, ahead: usize) -> Option<u64> {
        match self.peek(ahead) {
            Some(Token::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    fn is(&self, ahead: usize, expected: &Token) -> bool {
        self.peek(ahead) == Some(expected)
    }

    /// Parse the whole source, collecting declarations and statements
    pub fn parse_unit(&mut self) -> CompileResult<SourceUnit> {
        let mut unit = SourceUnit::default();

        while self.pos < self.tokens.len() {
            if let Some((decl, len)) = self.match_declaration()? {
                unit.declarations.push(decl);
                self.pos += len;
            } else if let Some((stmt, len)) = self.match_statement() {
                unit.statements.push(stmt);
                self.pos += len;
            } else {
                self.pos += 1;
            }
        }

        Ok(unit)
    }

    /// `Matrix [< T >] name ( rows , cols )`
    fn match_declaration(&self) -> CompileResult<Option<(Declaration, usize)>> {
        if !self.is(0, &Token::Matrix) {
            return Ok(None);
        }

        let mut i = 1;
        if self.is(i, &Token::Less) {
            if self.ident(i + 1).is_none() || !self.is(i + 2, &Token::Greater) {
                return Ok(None);
            }
            i += 3;
        }

        let Some(name) = self.ident(i) else {
            return Ok(None);
        };
        if !self.is(i + 1, &Token::LParen) || !self.is(i + 3, &Token::Comma) || !self.is(i + 5, &Token::RParen) {
            return Ok(None);
        }
        let (Some(rows), Some(cols)) = (self.integer(i + 2), self.integer(i + 4)) else {
            return Ok(None);
        };

        let rows = to_dimension(&name, rows)?;
        let cols = to_dimension(&name, cols)?;

        Ok(Some((
            Declaration {
                name,
                rows,
                cols,
            },
            i + 6,
        )))
    }

    /// `target = left op right ;` or `target = transpose ( source ) ;`
    fn match_statement(&self) -> Option<(Statement, usize)> {
        let target = self.ident(0)?;
        if !self.is(1, &Token::Equals) {
            return None;
        }

        let first = self.ident(2)?;

        if first == "transpose"
            && self.is(3, &Token::LParen)
            && self.is(5, &Token::RParen)
            && self.is(6, &Token::Semicolon)
        {
            let source = self.ident(4)?;
            return Some((
                Statement {
                    kind: OperationKind::Transpose,
                    target,
                    operands: vec![source],
                },
                7,
            ));
        }

        let kind = match self.peek(3)? {
            Token::Star => OperationKind::Multiply,
            Token::Plus => OperationKind::Add,
            Token::Minus => OperationKind::Subtract,
            _ => return None,
        };
        let second = self.ident(4)?;
        if !self.is(5, &Token::Semicolon) {
            return None;
        }

        Some((
            Statement {
                kind,
                target,
                operands: vec![first, second],
            },
            6,
        ))
    }
}

fn to_dimension(name: &str, value: u64) -> CompileResult<u32> {
    u32::try_from(value).map_err(|_| {
        CompileError::parse_error(format!(
            "Dimension {} of matrix '{}' does not fit in 32 bits",
            value, name
        ))
    })
}
