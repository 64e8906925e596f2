//! Abstract Syntax Tree for G-code programs
//!
//! Pure data: a program is a header followed by blocks, a block is an ordered
//! list of words. Comments never reach the tree.

use std::fmt;

use crate::parser::lexer::TokenKind;

/// A parsed program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub header: Header,
    pub blocks: Vec<Block>,
}

/// The `%` line opening a program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub identifier: Option<Identifier>,
}

/// What followed the `%` on the header line
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    Number(u32),
    /// Comment text including its parentheses
    Comment(String),
}

/// One line of words
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// 1-based source line the block starts on
    pub line: u32,
    pub number: Option<BlockNumber>,
    pub words: Vec<Word>,
}

/// The `N` field of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockNumber(pub u32);

/// A letter-prefixed numeric field like "X10.5"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub kind: TokenKind,
    pub value: f32,
}

impl Word {
    pub fn new(kind: TokenKind, value: f32) -> Self {
        debug_assert!(kind.is_word(), "{kind:?} is not a word category");
        Self { kind, value }
    }

    /// Whether this is the word `kind` with exactly `value`, e.g. `G96`
    pub fn is(&self, kind: TokenKind, value: f32) -> bool {
        self.kind == kind && self.value == value
    }
}

impl Block {
    /// First word of the given category
    pub fn get(&self, kind: TokenKind) -> Option<&Word> {
        self.words.iter().find(|w| w.kind == kind)
    }

    /// Value of the first word of the given category
    pub fn value(&self, kind: TokenKind) -> Option<f32> {
        self.get(kind).map(|w| w.value)
    }

    /// All words of the given category, in source order
    pub fn words_of(&self, kind: TokenKind) -> impl Iterator<Item = &Word> + '_ {
        self.words.iter().filter(move |w| w.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.words.is_empty()
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.value)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Comment(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("%")?;
        if let Some(identifier) = &self.identifier {
            write!(f, "{}", identifier)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(number) = self.number {
            write!(f, "{}", number)?;
            sep = " ";
        }
        for word in &self.words {
            write!(f, "{}{}", sep, word)?;
            sep = " ";
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for block in &self.blocks {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}
