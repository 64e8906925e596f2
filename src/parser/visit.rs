//! Read-only traversal of a parsed program.
//!
//! The node set is closed: a pass either matches on [`Node`] exhaustively
//! while folding over [`Program::nodes`], or implements [`Visitor`] and
//! overrides only the handlers it cares about.

use std::iter;

use crate::parser::ast::{Block, BlockNumber, Header, Program, Word};

/// A borrowed reference to any node of the tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Program(&'a Program),
    Header(&'a Header),
    Block(&'a Block),
    BlockNumber(&'a BlockNumber),
    Word(&'a Word),
}

/// One handler per node kind, all defaulting to no-ops
pub trait Visitor {
    fn visit_program(&mut self, _program: &Program) {}
    fn visit_header(&mut self, _header: &Header) {}
    fn visit_block(&mut self, _block: &Block) {}
    fn visit_block_number(&mut self, _number: &BlockNumber) {}
    fn visit_word(&mut self, _word: &Word) {}
}

impl Node<'_> {
    /// Dispatch this node to the matching handler
    pub fn accept<V: Visitor + ?Sized>(self, visitor: &mut V) {
        match self {
            Node::Program(p) => visitor.visit_program(p),
            Node::Header(h) => visitor.visit_header(h),
            Node::Block(b) => visitor.visit_block(b),
            Node::BlockNumber(n) => visitor.visit_block_number(n),
            Node::Word(w) => visitor.visit_word(w),
        }
    }
}

impl Program {
    /// Every node in document order: the program, its header, then each block
    /// followed by its number and words.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::Program(self))
            .chain(iter::once(Node::Header(&self.header)))
            .chain(self.blocks.iter().flat_map(|b| b.nodes()))
    }

    /// Drive a visitor over the whole tree
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        for node in self.nodes() {
            node.accept(visitor);
        }
    }
}

impl Block {
    /// The block, its optional number, then its words
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::Block(self))
            .chain(self.number.iter().map(Node::BlockNumber))
            .chain(self.words.iter().map(Node::Word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Identifier;
    use crate::parser::lexer::TokenKind;

    fn program() -> Program {
        Program {
            header: Header {
                identifier: Some(Identifier::Number(7)),
            },
            blocks: vec![
                Block {
                    line: 2,
                    number: Some(BlockNumber(10)),
                    words: vec![Word::new(TokenKind::G, 0.0), Word::new(TokenKind::X, 1.0)],
                },
                Block {
                    line: 3,
                    number: None,
                    words: vec![Word::new(TokenKind::M, 30.0)],
                },
            ],
        }
    }

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Visitor for Trace {
        fn visit_header(&mut self, header: &Header) {
            self.0.push(header.to_string());
        }

        fn visit_block_number(&mut self, number: &BlockNumber) {
            self.0.push(number.to_string());
        }

        fn visit_word(&mut self, word: &Word) {
            self.0.push(word.to_string());
        }
    }

    #[test]
    fn test_visitor_sees_document_order() {
        let mut trace = Trace::default();
        program().accept(&mut trace);
        assert_eq!(trace.0, vec!["%7", "N10", "G0", "X1", "M30"]);
    }

    #[test]
    fn test_nodes_order() {
        let p = program();
        let kinds: Vec<&str> = p
            .nodes()
            .map(|n| match n {
                Node::Program(_) => "program",
                Node::Header(_) => "header",
                Node::Block(_) => "block",
                Node::BlockNumber(_) => "number",
                Node::Word(_) => "word",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["program", "header", "block", "number", "word", "word", "block", "word"]
        );
    }

    #[test]
    fn test_independent_passes_share_one_tree() {
        let p = program();
        let words = p.nodes().filter(|n| matches!(n, Node::Word(_))).count();
        let blocks = p.nodes().filter(|n| matches!(n, Node::Block(_))).count();
        assert_eq!((words, blocks), (3, 2));
    }
}
