//! G-code Lexer
//!
//! Turns a text snapshot into positioned tokens. Offsets and lengths are byte
//! positions into the original text so the highlighter and error reporting can
//! slice the source directly.

use std::fmt;

use crate::parser::error::LexError;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    N,
    O,

    G,

    X,
    Y,
    Z,
    U,
    V,
    W,
    P,
    Q,
    R,
    A,
    B,
    C,

    I,
    J,
    K,

    E,
    F,

    S,

    D,
    T,

    M,

    Comment,
    Number,

    AlignmentChar,
    Equal,
    OptBlockSkip,
    Percent,

    EndOfBlock,
    EndOfFile,
    Unknown,
}

impl TokenKind {
    /// Map an address letter to its category
    pub fn from_letter(c: char) -> Option<Self> {
        let kind = match c {
            'N' => Self::N,
            'O' => Self::O,
            'G' => Self::G,
            'X' => Self::X,
            'Y' => Self::Y,
            'Z' => Self::Z,
            'U' => Self::U,
            'V' => Self::V,
            'W' => Self::W,
            'P' => Self::P,
            'Q' => Self::Q,
            'R' => Self::R,
            'A' => Self::A,
            'B' => Self::B,
            'C' => Self::C,
            'I' => Self::I,
            'J' => Self::J,
            'K' => Self::K,
            'E' => Self::E,
            'F' => Self::F,
            'S' => Self::S,
            'D' => Self::D,
            'T' => Self::T,
            'M' => Self::M,
            _ => return None,
        };
        Some(kind)
    }

    /// The address letter of a word category
    pub fn letter(self) -> Option<char> {
        let c = match self {
            Self::N => 'N',
            Self::O => 'O',
            Self::G => 'G',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::U => 'U',
            Self::V => 'V',
            Self::W => 'W',
            Self::P => 'P',
            Self::Q => 'Q',
            Self::R => 'R',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::I => 'I',
            Self::J => 'J',
            Self::K => 'K',
            Self::E => 'E',
            Self::F => 'F',
            Self::S => 'S',
            Self::D => 'D',
            Self::T => 'T',
            Self::M => 'M',
            _ => return None,
        };
        Some(c)
    }

    /// Letter-prefixed categories that carry a numeral
    pub fn is_word(self) -> bool {
        self.letter().is_some()
    }

    pub fn is_axis(self) -> bool {
        matches!(
            self,
            Self::X
                | Self::Y
                | Self::Z
                | Self::U
                | Self::V
                | Self::W
                | Self::P
                | Self::Q
                | Self::R
                | Self::A
                | Self::B
                | Self::C
        )
    }

    pub fn is_interpolation(self) -> bool {
        matches!(self, Self::I | Self::J | Self::K)
    }

    pub fn is_feed(self) -> bool {
        matches!(self, Self::E | Self::F)
    }

    pub fn is_tool(self) -> bool {
        matches!(self, Self::D | Self::T)
    }

    /// Human readable category name, used by hover text
    pub fn describe(self) -> &'static str {
        match self {
            Self::N => "line number",
            Self::O => "program number",
            Self::G => "preparatory word",
            k if k.is_axis() => "axis word",
            k if k.is_interpolation() => "interpolation center",
            k if k.is_feed() => "feed rate",
            Self::S => "spindle speed",
            k if k.is_tool() => "tool word",
            Self::M => "miscellaneous function",
            Self::Comment => "comment",
            Self::Number => "number",
            Self::AlignmentChar => "alignment character",
            Self::Equal => "equal sign",
            Self::OptBlockSkip => "optional block skip",
            Self::Percent => "program delimiter",
            Self::EndOfBlock => "end of block",
            Self::EndOfFile => "end of file",
            _ => "unknown",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = self.letter() {
            return write!(f, "{}", c);
        }
        let s = match self {
            Self::Comment => "comment",
            Self::Number => "number",
            Self::AlignmentChar => ":",
            Self::Equal => "=",
            Self::OptBlockSkip => "/",
            Self::Percent => "%",
            Self::EndOfBlock => "newline",
            Self::EndOfFile => "end of file",
            _ => "unknown character",
        };
        f.write_str(s)
    }
}

/// A positioned token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub offset: usize,
    pub length: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Slice the token's text out of the source it was lexed from
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.end()]
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({},{})", self.kind, self.offset, self.length)
    }
}

/// Forward-only tokenizer over a borrowed text
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            finished: false,
        }
    }

    /// Produce the next token. Once the text is exhausted every call returns
    /// `EndOfFile` at the text length.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        while let Some(c) = self.peek_char() {
            let start = self.pos;
            self.pos += c.len_utf8();

            match c {
                '\n' => return Ok(self.token(start, TokenKind::EndOfBlock)),
                c if c.is_whitespace() || c.is_control() => continue,
                '+' | '-' | '.' | '0'..='9' => return Ok(self.numeral(start, c)),
                c if c.is_alphabetic() => {
                    let kind = TokenKind::from_letter(c).unwrap_or(TokenKind::Unknown);
                    return Ok(self.token(start, kind));
                }
                '(' => return self.comment(start),
                '=' => return Ok(self.token(start, TokenKind::Equal)),
                '%' => return Ok(self.token(start, TokenKind::Percent)),
                ':' => return Ok(self.token(start, TokenKind::AlignmentChar)),
                '/' => return Ok(self.token(start, TokenKind::OptBlockSkip)),
                _ => return Ok(self.token(start, TokenKind::Unknown)),
            }
        }

        Ok(Token {
            offset: self.text.len(),
            length: 0,
            kind: TokenKind::EndOfFile,
        })
    }

    /// Look at the next token without consuming it
    pub fn peek(&self) -> Result<Token, LexError> {
        self.clone().next_token()
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn token(&self, start: usize, kind: TokenKind) -> Token {
        Token {
            offset: start,
            length: self.pos - start,
            kind,
        }
    }

    fn scan_digits(&mut self) {
        let rest = &self.text.as_bytes()[self.pos..];
        self.pos += rest.iter().take_while(|b| b.is_ascii_digit()).count();
    }

    fn numeral(&mut self, start: usize, first: char) -> Token {
        self.scan_digits();
        // a numeral that opened with '.' already has its decimal point
        if first != '.' && self.peek_char() == Some('.') {
            self.pos += 1;
            self.scan_digits();
        }
        self.token(start, TokenKind::Number)
    }

    fn comment(&mut self, start: usize) -> Result<Token, LexError> {
        while let Some(c) = self.peek_char() {
            let at = self.pos;
            self.pos += c.len_utf8();
            match c {
                ')' => break,
                ':' | '%' => {
                    return Err(LexError {
                        character: c,
                        offset: at,
                        length: 1,
                    });
                }
                _ => {}
            }
        }
        Ok(self.token(start, TokenKind::Comment))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    /// Yields every token up to and including `EndOfFile`, or up to the first
    /// lexical error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        self.finished = match &result {
            Ok(token) => token.kind == TokenKind::EndOfFile,
            Err(_) => true,
        };
        Some(result)
    }
}
