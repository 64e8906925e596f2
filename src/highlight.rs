//! Syntax highlighting
//!
//! Maps token categories onto a small set of styles. A letter directly
//! followed by its numeral is styled as one span.

use serde::Serialize;

use crate::parser::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Command,
    Axis,
    Parameter,
    Rate,
    Numbering,
    Arc,
    Comment,
    Delimiter,
}

impl Style {
    pub const ALL: [Style; 8] = [
        Style::Command,
        Style::Axis,
        Style::Parameter,
        Style::Rate,
        Style::Numbering,
        Style::Arc,
        Style::Comment,
        Style::Delimiter,
    ];

    pub fn for_kind(kind: TokenKind) -> Option<Self> {
        use TokenKind::*;
        match kind {
            G | M => Some(Style::Command),
            X | Y | Z | U | V | W | A | B | C => Some(Style::Axis),
            P | Q | R | D | T => Some(Style::Parameter),
            E | F | S => Some(Style::Rate),
            N | O => Some(Style::Numbering),
            I | J | K => Some(Style::Arc),
            Comment => Some(Style::Comment),
            Percent | Equal | AlignmentChar | OptBlockSkip => Some(Style::Delimiter),
            Number | EndOfBlock | EndOfFile | Unknown => None,
        }
    }

    /// Position in [`Style::ALL`]
    pub fn index(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyledSpan {
    pub offset: usize,
    pub length: usize,
    pub style: Style,
}

impl StyledSpan {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Styled spans in document order. Stops at the first lexical error.
pub fn highlight(text: &str) -> Vec<StyledSpan> {
    let mut spans = Vec::new();
    let mut letter: Option<Token> = None;

    for result in Lexer::new(text) {
        let Ok(token) = result else {
            break;
        };

        if let Some(pending) = letter.take() {
            if token.kind == TokenKind::Number {
                if let Some(style) = Style::for_kind(pending.kind) {
                    spans.push(StyledSpan {
                        offset: pending.offset,
                        length: token.end() - pending.offset,
                        style,
                    });
                }
                continue;
            }
        }

        if token.kind.is_word() {
            letter = Some(token);
        } else if let Some(style) = Style::for_kind(token.kind) {
            spans.push(StyledSpan {
                offset: token.offset,
                length: token.length,
                style,
            });
        }
    }

    spans
}
