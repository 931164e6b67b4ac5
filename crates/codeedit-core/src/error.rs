//! Shared error types for codeedit-core
//!
//! ARCHITECTURE: Using thiserror for ergonomic error handling.
//! All library functions return Result<T, Error>.
//! NO panics allowed in library code (enforced by clippy lints).

use std::path::PathBuf;
use thiserror::Error;

/// Error types shared by the language registry, parser facade, and graph builder.
#[derive(Debug, Error)]
pub enum Error {
    /// Language could not be detected from file path
    #[error("Unsupported language for file: {0}")]
    UnsupportedLanguage(PathBuf),

    /// tree-sitter failed to parse source code
    #[error("Failed to parse source code: {0}")]
    ParseError(String),

    /// tree-sitter language/query loading error
    #[error("Tree-sitter language error: {0}")]
    TreeSitterError(#[from] tree_sitter::LanguageError),

    /// A tree-sitter query failed to compile
    #[error("Tree-sitter query error: {0}")]
    QueryError(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

/// Result type alias for codeedit-core operations
pub type Result<T> = std::result::Result<T, Error>;
