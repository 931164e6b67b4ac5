//! codeedit-core: Language Registry, Parser Facade, and Graph Builder.
//!
//! ARCHITECTURE: this crate is the pure, I/O-light foundation used by
//! `codeedit-engine`. It knows how to detect a language, parse it with
//! tree-sitter, and extract a `Graph` of symbols/imports/line-kinds from a
//! set of files. It does not know about edit plans, mutation, or
//! verification - that logic lives in `codeedit-engine` and depends on
//! this crate, not the other way around.
//!
//! Modules:
//! - [`language`]: the Language Registry - per-language node-type tables,
//!   symbol/import queries, and extension detection.
//! - [`parser`]: the Parser Facade - a thin tree-sitter wrapper that never
//!   fails to produce a tree.
//! - [`graph`]: the Graph Builder - turns a list of files into symbols,
//!   imports, and per-line construct tags.
//! - [`error`]: shared error/result types.

pub mod error;
pub mod graph;
pub mod language;
pub mod parser;

pub use error::{Error, Result};
pub use graph::{build_graph, Graph, GraphError, GraphSymbolKind, Import, Symbol};
pub use language::{node_types, Language, NormalizedKind, SymbolKind};
pub use parser::{descendant_at_byte, has_error_nodes, Parser};

/// Detect the language of a file from its path, applying the same
/// extension table used throughout the Language Registry.
pub fn detect_language(path: &std::path::Path) -> Option<Language> {
    Language::from_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn detect_language_round_trips_known_extensions() {
        assert_eq!(detect_language(Path::new("foo.rs")), Some(Language::Rust));
        assert_eq!(detect_language(Path::new("foo.go")), Some(Language::Go));
        assert_eq!(detect_language(Path::new("foo.unknown")), None);
    }
}
