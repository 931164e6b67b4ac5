//! Parser Facade - thin wrapper around tree-sitter that never fails to parse.
//!
//! ARCHITECTURE: tree-sitter's `Parser::parse` returns `None` only on
//! cancellation or a timeout, neither of which we configure, so `parse`
//! here always returns a `Tree` - syntax errors surface as ERROR nodes
//! inside it rather than as an `Err`. Callers that need "is this
//! syntactically valid" check `has_error_nodes`.

use crate::error::{Error, Result};
use crate::language::Language;
use tree_sitter::{Node, Tree};

/// Wraps a tree-sitter `Parser` configured for one `Language`.
pub struct Parser {
    language: Language,
    inner: tree_sitter::Parser,
}

impl Parser {
    /// Create a parser for the given language.
    pub fn new(language: Language) -> Result<Self> {
        let mut inner = tree_sitter::Parser::new();
        inner.set_language(&language.to_tree_sitter())?;
        Ok(Self { language, inner })
    }

    /// The language this parser was configured for.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse source bytes into a tree. Never returns `Err` for syntactically
    /// invalid input - ERROR nodes are embedded in the returned tree instead.
    pub fn parse(&mut self, source: &[u8]) -> Result<Tree> {
        self.inner
            .parse(source, None)
            .ok_or_else(|| Error::ParseError("tree-sitter returned no tree".to_string()))
    }

    /// Re-parse using a previous tree as a hint for tree-sitter's incremental
    /// parsing (not currently used by any caller with edits applied to the
    /// old tree, but kept since `codeedit-engine`'s preflight simulation
    /// (L5) re-parses the post-edit buffer from scratch and benefits from
    /// passing the prior tree as a structural hint).
    pub fn reparse(&mut self, source: &[u8], old_tree: Option<&Tree>) -> Result<Tree> {
        self.inner
            .parse(source, old_tree)
            .ok_or_else(|| Error::ParseError("tree-sitter returned no tree".to_string()))
    }
}

/// Recursively check whether `tree` contains any ERROR or MISSING node.
pub fn has_error_nodes(tree: &Tree) -> bool {
    fn walk(node: Node) -> bool {
        if node.is_error() || node.is_missing() {
            return true;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if walk(child) {
                return true;
            }
        }
        false
    }
    walk(tree.root_node())
}

/// Find the smallest node whose byte range contains `byte_offset`.
///
/// Used by the L3 string/comment-context check and by idempotence checks
/// (e.g. "is this import already present at this point in the tree").
pub fn descendant_at_byte(tree: &Tree, byte_offset: usize) -> Option<Node<'_>> {
    tree.root_node()
        .descendant_for_byte_range(byte_offset, byte_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_python() {
        let mut parser = Parser::new(Language::Python).unwrap();
        let tree = parser.parse(b"def foo():\n    pass\n").unwrap();
        assert!(!has_error_nodes(&tree));
    }

    #[test]
    fn surfaces_error_nodes_for_broken_syntax() {
        let mut parser = Parser::new(Language::Python).unwrap();
        let tree = parser.parse(b"def foo(:\n").unwrap();
        assert!(has_error_nodes(&tree));
    }

    #[test]
    fn descendant_at_byte_finds_innermost_node() {
        let mut parser = Parser::new(Language::Rust).unwrap();
        let src = b"fn main() { let x = 1; }";
        let tree = parser.parse(src).unwrap();
        let node = descendant_at_byte(&tree, 20).unwrap();
        assert!(node.byte_range().contains(&20));
    }
}
