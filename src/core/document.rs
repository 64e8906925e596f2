//! Document Text
//!
//! Immutable document snapshots and offset/line conversion.

use std::sync::Arc;

/// 1-based line and character column of a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// Byte offsets of every line start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 0-based line holding `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Text of a 0-based line without its line feed
    pub fn line_text<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self
            .line_start(line + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        text.get(start..end)
    }

    /// 1-based line and character column, clamping `offset` to the text
    pub fn location(&self, text: &str, offset: usize) -> Location {
        let offset = floor_char_boundary(text, offset);
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        Location {
            line: line + 1,
            column: text[start..offset].chars().count() + 1,
        }
    }

    /// 0-based line and UTF-16 column, as editors count them
    pub fn position(&self, text: &str, offset: usize) -> (u32, u32) {
        let offset = floor_char_boundary(text, offset);
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        let column: usize = text[start..offset].chars().map(char::len_utf16).sum();
        (line as u32, column as u32)
    }

    /// Byte offset of a 0-based line and UTF-16 column
    pub fn offset(&self, text: &str, line: u32, character: u32) -> Option<usize> {
        let line_text = self.line_text(text, line as usize)?;
        let start = self.line_starts[line as usize];
        let mut units = 0;
        for (i, c) in line_text.char_indices() {
            if units >= character as usize {
                return Some(start + i);
            }
            units += c.len_utf16();
        }
        Some(start + line_text.len())
    }
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// One version of a document's text, shared without copying
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub text: Arc<str>,
    pub version: i32,
    index: Arc<LineIndex>,
}

impl Snapshot {
    pub fn new(text: impl Into<Arc<str>>, version: i32) -> Self {
        let text = text.into();
        let index = Arc::new(LineIndex::new(&text));
        Self {
            text,
            version,
            index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &LineIndex {
        &self.index
    }

    pub fn location(&self, offset: usize) -> Location {
        self.index.location(&self.text, offset)
    }

    pub fn position(&self, offset: usize) -> (u32, u32) {
        self.index.position(&self.text, offset)
    }

    pub fn offset(&self, line: u32, character: u32) -> Option<usize> {
        self.index.offset(&self.text, line, character)
    }
}
