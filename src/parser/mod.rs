//! G-code Parser
//!
//! Lexer, recursive-descent parser and tree for the block/word language.
//! Parsing works on one borrowed, immutable text and either returns a whole
//! [`Program`] or the first positioned [`Error`].

pub mod ast;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod visit;

pub use ast::{Block, BlockNumber, Header, Identifier, Program, Word};
pub use error::{Error, LexError, ParseError, ParseErrorKind};
pub use grammar::Parser;
pub use lexer::{Lexer, Token, TokenKind};
pub use visit::{Node, Visitor};

/// Parse a complete program
pub fn parse(text: &str) -> Result<Program, Error> {
    Parser::new(text).parse()
}

/// Tokenize a complete text, ending with the `EndOfFile` token
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).collect()
}
