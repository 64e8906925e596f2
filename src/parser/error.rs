//! Positioned lexing and parsing errors.
//!
//! Errors carry byte offsets only. Turning an offset into a line and column is
//! left to whoever owns the text (see `core::document::LineIndex`).

use std::ops::Range;

use thiserror::Error;

use crate::parser::ast::Word;
use crate::parser::lexer::TokenKind;

/// An illegal character inside a restricted lexical context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal character '{character}' within comment")]
pub struct LexError {
    pub character: char,
    pub offset: usize,
    pub length: usize,
}

/// What went wrong while parsing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, not {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("expected number after {0}")]
    ExpectedNumber(TokenKind),

    #[error("expected unsigned integer after {0}")]
    ExpectedUnsigned(TokenKind),

    #[error("illegal duplicate {0} within block")]
    DuplicateWord(Word),

    #[error("cannot specify {0} twice within a block")]
    DuplicateKind(TokenKind),
}

/// A grammar violation at a source position
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub length: usize,
}

/// Any error that aborts a parse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    pub fn offset(&self) -> usize {
        match self {
            Self::Lex(e) => e.offset,
            Self::Parse(e) => e.offset,
        }
    }

    pub fn length(&self) -> usize {
        match self {
            Self::Lex(e) => e.length,
            Self::Parse(e) => e.length,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.offset()..self.offset() + self.length()
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::Lex(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ParseError {
            kind: ParseErrorKind::ExpectedNumber(TokenKind::G),
            offset: 3,
            length: 0,
        };
        assert_eq!(err.to_string(), "expected number after G");

        let err = ParseErrorKind::DuplicateWord(Word::new(TokenKind::G, 1.0));
        assert_eq!(err.to_string(), "illegal duplicate G1 within block");

        let err = ParseErrorKind::DuplicateKind(TokenKind::X);
        assert_eq!(err.to_string(), "cannot specify X twice within a block");

        let err = ParseErrorKind::Unexpected {
            expected: "newline ending block",
            found: TokenKind::EndOfFile.to_string(),
        };
        assert_eq!(err.to_string(), "expected newline ending block, not end of file");
    }

    #[test]
    fn test_span_accessors() {
        let err = Error::from(LexError {
            character: ':',
            offset: 7,
            length: 1,
        });
        assert!(err.is_lexical());
        assert_eq!(err.span(), 7..8);
        assert_eq!(err.to_string(), "illegal character ':' within comment");
    }
}
