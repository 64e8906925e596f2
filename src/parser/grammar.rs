//! Recursive-descent parser
//!
//! Two tokens of lookahead (`cur` and `next`), no backtracking and no error
//! recovery: the first violation aborts the parse.
//!
//! ```text
//! Program := Header Block*
//! Header  := '%' (Comment | Number)? (EndOfBlock | EndOfFile)
//! Block   := LineNumber? GWord* AxisWord* (InterpWord* FeedWord*)? SpeedWord?
//!            ToolWord* MiscWord* (EndOfBlock | EndOfFile)
//! ```

use std::collections::HashSet;

use crate::parser::ast::{Block, BlockNumber, Header, Identifier, Program, Word};
use crate::parser::error::{Error, LexError, ParseError, ParseErrorKind};
use crate::parser::lexer::{Lexer, Token, TokenKind};

/// Builds a [`Program`] from one borrowed text snapshot
pub struct Parser<'a> {
    text: &'a str,
    lexer: Lexer<'a>,
    cur: Token,
    next: Token,
    // newline bookkeeping for block line numbers
    line: u32,
    line_offset: usize,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str) -> Self {
        let start = Token {
            offset: 0,
            length: 0,
            kind: TokenKind::EndOfFile,
        };
        Self {
            text,
            lexer: Lexer::new(text),
            cur: start,
            next: start,
            line: 1,
            line_offset: 0,
        }
    }

    /// Parse the whole text
    pub fn parse(mut self) -> Result<Program, Error> {
        self.advance()?;
        self.advance()?;

        let header = self.header()?;
        let mut blocks = Vec::new();
        while self.cur.kind != TokenKind::EndOfFile {
            blocks.push(self.block()?);
        }

        Ok(Program { header, blocks })
    }

    /// Shift the lookahead window by one token. Comments are skipped once they
    /// reach `cur`, so grammar rules only ever see them as `next`.
    fn advance(&mut self) -> Result<(), LexError> {
        loop {
            self.cur = self.next;
            self.next = self.lexer.next_token()?;
            if self.cur.kind != TokenKind::Comment {
                return Ok(());
            }
        }
    }

    fn header(&mut self) -> Result<Header, Error> {
        if self.cur.kind != TokenKind::Percent {
            return Err(self.unexpected("% starting header", self.cur));
        }

        let identifier = match self.next.kind {
            TokenKind::Comment => {
                let text = self.next.text(self.text).to_string();
                // lands past the comment, which `advance` skips
                self.advance()?;
                Some(Identifier::Comment(text))
            }
            TokenKind::Number => Some(Identifier::Number(self.fetch_unsigned()?)),
            _ => {
                self.advance()?;
                None
            }
        };

        self.end_of_line("newline ending header")?;
        Ok(Header { identifier })
    }

    fn block(&mut self) -> Result<Block, Error> {
        let mut block = Block {
            line: self.line_of(self.cur.offset),
            number: None,
            words: Vec::new(),
        };
        let mut seen_kinds = HashSet::new();

        if self.cur.kind == TokenKind::N {
            block.number = Some(BlockNumber(self.fetch_unsigned()?));
        }

        // preparatory words
        while self.cur.kind == TokenKind::G {
            self.push_unique_word(&mut block.words)?;
        }

        // dimension words
        let mut has_axis = false;
        while self.cur.kind.is_axis() {
            self.push_unique_kind(&mut block.words, &mut seen_kinds)?;
            has_axis = true;
        }

        if has_axis {
            while self.cur.kind.is_interpolation() {
                self.push_unique_kind(&mut block.words, &mut seen_kinds)?;
            }
            while self.cur.kind.is_feed() {
                self.push_unique_kind(&mut block.words, &mut seen_kinds)?;
            }
        }

        if self.cur.kind == TokenKind::S {
            let word = self.fetch_word()?;
            block.words.push(word);
        }

        while self.cur.kind.is_tool() {
            self.push_unique_kind(&mut block.words, &mut seen_kinds)?;
        }

        // auxiliary words
        while self.cur.kind == TokenKind::M {
            self.push_unique_word(&mut block.words)?;
        }

        self.end_of_line("newline ending block")?;
        Ok(block)
    }

    /// G and M: the same code twice in one block is illegal, different codes
    /// of the same category are fine.
    fn push_unique_word(&mut self, words: &mut Vec<Word>) -> Result<(), Error> {
        let start = self.cur.offset;
        let end = self.next.end();
        let word = self.fetch_word()?;
        if words.contains(&word) {
            return Err(ParseError {
                kind: ParseErrorKind::DuplicateWord(word),
                offset: start,
                length: end - start,
            }
            .into());
        }
        words.push(word);
        Ok(())
    }

    /// Every other category may appear once per block, whatever its value.
    fn push_unique_kind(
        &mut self,
        words: &mut Vec<Word>,
        seen: &mut HashSet<TokenKind>,
    ) -> Result<(), Error> {
        if !seen.insert(self.cur.kind) {
            return Err(self.error(ParseErrorKind::DuplicateKind(self.cur.kind), self.cur));
        }
        let word = self.fetch_word()?;
        words.push(word);
        Ok(())
    }

    fn fetch_word(&mut self) -> Result<Word, Error> {
        let kind = self.cur.kind;
        if self.next.kind == TokenKind::Number {
            if let Ok(value) = self.next.text(self.text).parse::<f32>() {
                self.advance()?;
                self.advance()?;
                return Ok(Word::new(kind, value));
            }
        }
        Err(self.error(ParseErrorKind::ExpectedNumber(kind), self.next))
    }

    /// The leading digit run of the numeral; `N1.5` numbers its block 1.
    fn fetch_unsigned(&mut self) -> Result<u32, Error> {
        let kind = self.cur.kind;
        if self.next.kind == TokenKind::Number {
            let numeral = self.next.text(self.text);
            let digits = numeral
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(numeral.len());
            if let Ok(value) = numeral[..digits].parse::<u32>() {
                self.advance()?;
                self.advance()?;
                return Ok(value);
            }
        }
        Err(self.error(ParseErrorKind::ExpectedUnsigned(kind), self.next))
    }

    fn end_of_line(&mut self, expected: &'static str) -> Result<(), Error> {
        match self.cur.kind {
            TokenKind::EndOfBlock | TokenKind::EndOfFile => {
                self.advance()?;
                Ok(())
            }
            _ => Err(self.unexpected(expected, self.cur)),
        }
    }

    /// 1-based line of `offset`; offsets must be requested in increasing order
    fn line_of(&mut self, offset: usize) -> u32 {
        let newlines = self.text.as_bytes()[self.line_offset..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.line += newlines as u32;
        self.line_offset = offset;
        self.line
    }

    fn unexpected(&self, expected: &'static str, token: Token) -> Error {
        let found = match token.kind {
            TokenKind::Unknown => format!("'{}'", token.text(self.text)),
            kind => kind.to_string(),
        };
        self.error(ParseErrorKind::Unexpected { expected, found }, token)
    }

    fn error(&self, kind: ParseErrorKind, token: Token) -> Error {
        ParseError {
            kind,
            offset: token.offset,
            length: token.length,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Program, Error> {
        Parser::new(text).parse()
    }

    fn parse_err(text: &str) -> ParseError {
        match parse(text) {
            Err(Error::Parse(e)) => e,
            other => panic!("expected parse error for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_parse_simple_program() {
        let program = parse("%\nN10 G1 X10 Y20.5 F100\nM30\n").unwrap();

        assert_eq!(program.header, Header::default());
        assert_eq!(program.blocks.len(), 2);

        let first = &program.blocks[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.number, Some(BlockNumber(10)));
        assert_eq!(
            first.words,
            vec![
                Word::new(TokenKind::G, 1.0),
                Word::new(TokenKind::X, 10.0),
                Word::new(TokenKind::Y, 20.5),
                Word::new(TokenKind::F, 100.0),
            ]
        );
        assert_eq!(program.blocks[1].words, vec![Word::new(TokenKind::M, 30.0)]);
    }

    #[test]
    fn test_header_identifiers() {
        assert_eq!(parse("%\n").unwrap().header.identifier, None);
        assert_eq!(
            parse("%(job1)\n").unwrap().header.identifier,
            Some(Identifier::Comment("(job1)".to_string()))
        );
        assert_eq!(
            parse("%12\n").unwrap().header.identifier,
            Some(Identifier::Number(12))
        );
    }

    #[test]
    fn test_header_comment_followed_by_blocks() {
        let program = parse("%(job1)\nG1 X1\n").unwrap();
        assert_eq!(program.blocks.len(), 1);
        assert_eq!(program.blocks[0].line, 2);
    }

    #[test]
    fn test_header_at_end_of_file() {
        let program = parse("%").unwrap();
        assert!(program.blocks.is_empty());
    }

    #[test]
    fn test_missing_header() {
        let err = parse_err("G1 X1\n");
        assert_eq!(err.to_string(), "expected % starting header, not G");
        assert_eq!((err.offset, err.length), (0, 1));
    }

    #[test]
    fn test_trailing_token_after_header() {
        let err = parse_err("%12 X\n");
        assert_eq!(err.to_string(), "expected newline ending header, not X");
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_duplicate_g_word_rejected() {
        let err = parse_err("%\nG01 G01\n");
        assert_eq!(err.kind, ParseErrorKind::DuplicateWord(Word::new(TokenKind::G, 1.0)));
        assert_eq!((err.offset, err.length), (6, 3));
    }

    #[test]
    fn test_different_g_words_allowed() {
        let program = parse("%\nG01 G02\n").unwrap();
        assert_eq!(program.blocks[0].words.len(), 2);
    }

    #[test]
    fn test_duplicate_m_word_rejected() {
        let err = parse_err("%\nM3 M3\n");
        assert!(matches!(err.kind, ParseErrorKind::DuplicateWord(_)));
        assert!(parse("%\nM3 M8\n").is_ok());
    }

    #[test]
    fn test_duplicate_axis_rejected() {
        let err = parse_err("%\nX1 X2\n");
        assert_eq!(err.kind, ParseErrorKind::DuplicateKind(TokenKind::X));
        assert_eq!((err.offset, err.length), (5, 1));
        assert!(parse("%\nX1 Y2\n").is_ok());
    }

    #[test]
    fn test_duplicate_tool_rejected_even_with_other_value() {
        let err = parse_err("%\nT1 T2\n");
        assert_eq!(err.kind, ParseErrorKind::DuplicateKind(TokenKind::T));
    }

    #[test]
    fn test_duplicates_reset_per_block() {
        let program = parse("%\nG1 X1\nG1 X2\n").unwrap();
        assert_eq!(program.blocks.len(), 2);
    }

    #[test]
    fn test_feed_requires_axis() {
        let err = parse_err("%\nG1 F100\n");
        assert_eq!(err.to_string(), "expected newline ending block, not F");
        assert!(parse("%\nG1 X1 F100\n").is_ok());
    }

    #[test]
    fn test_out_of_order_words_rejected() {
        let err = parse_err("%\nX1 G1\n");
        assert_eq!(err.to_string(), "expected newline ending block, not G");
    }

    #[test]
    fn test_missing_numeral() {
        let err = parse_err("%\nG");
        assert_eq!(err.to_string(), "expected number after G");
        assert_eq!((err.offset, err.length), (3, 0));

        let err = parse_err("%\nG\n");
        assert_eq!(err.to_string(), "expected number after G");
    }

    #[test]
    fn test_malformed_numeral() {
        let err = parse_err("%\nX-\n");
        assert_eq!(err.to_string(), "expected number after X");
        assert_eq!((err.offset, err.length), (3, 1));
    }

    #[test]
    fn test_block_number_must_be_unsigned() {
        let err = parse_err("%\nN-3 G1\n");
        assert_eq!(err.to_string(), "expected unsigned integer after N");
        assert_eq!((err.offset, err.length), (3, 2));

        let err = parse_err("%\nN.5 G1\n");
        assert_eq!(err.kind, ParseErrorKind::ExpectedUnsigned(TokenKind::N));
    }

    #[test]
    fn test_unsigned_takes_leading_digits() {
        let program = parse("%\nN1.5 G1\n").unwrap();
        assert_eq!(program.blocks[0].number, Some(BlockNumber(1)));
        assert_eq!(program.blocks[0].words, vec![Word::new(TokenKind::G, 1.0)]);

        let program = parse("%12.0\n").unwrap();
        assert_eq!(program.header.identifier, Some(Identifier::Number(12)));
    }

    #[test]
    fn test_interpolation_requires_axis() {
        let err = parse_err("%\nG1 I1\n");
        assert_eq!(err.to_string(), "expected newline ending block, not I");
        assert_eq!(err.offset, 5);

        let program = parse("%\nG2 X1 Y1 I1 J0 K0\n").unwrap();
        assert_eq!(program.blocks[0].words.len(), 6);
    }

    #[test]
    fn test_comments_are_dropped() {
        let program = parse("%\nG1 (move) X1 (to x)\n(only a comment)\n").unwrap();
        assert_eq!(program.blocks[0].words.len(), 2);
        assert!(program.blocks[1].is_empty());
    }

    #[test]
    fn test_lex_error_aborts_parse() {
        let err = parse("%\nG1 (a:b)\n").unwrap_err();
        assert!(err.is_lexical());
        assert_eq!(err.offset(), 7);
    }

    #[test]
    fn test_unknown_character_reported_verbatim() {
        let err = parse_err("%\nG1 #\n");
        assert_eq!(err.to_string(), "expected newline ending block, not '#'");
    }

    #[test]
    fn test_final_block_without_newline() {
        let program = parse("%\nG1 X1\nM30").unwrap();
        assert_eq!(program.blocks.len(), 2);
        assert_eq!(program.blocks[1].line, 3);
    }

    #[test]
    fn test_line_numbers_follow_multiline_comments() {
        let program = parse("%\n(first\nsecond)\nG1\n").unwrap();
        assert_eq!(program.blocks.len(), 2);
        assert_eq!(program.blocks[1].line, 4);
    }
}
