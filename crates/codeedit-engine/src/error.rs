//! Error types for the locator resolver, verifier, mutators, templates,
//! fragments, and plan interpreter.

use thiserror::Error;

/// Errors raised while resolving, verifying, mutating, or interpreting a plan.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] codeedit_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid plan JSON: {0}")]
    PlanJson(#[from] serde_json::Error),

    /// Zero nodes matched a locator where at least one was required.
    #[error("locator matched no nodes: {0}")]
    LocatorMiss(String),

    /// Multiple nodes matched a locator requiring a unique target.
    #[error("locator matched multiple nodes ambiguously: {0}")]
    LocatorAmbiguous(String),

    /// A template or primitive parameter was missing, mistyped, or unparsable.
    #[error("parameter validation failed: {0}")]
    ParamValidation(String),

    /// A legacy text pattern was not found in the target file.
    #[error("pattern not found: {0}")]
    PatternNotFound(String),

    /// The post-edit buffer contains ERROR/MISSING nodes.
    #[error("syntax error after edit: {0}")]
    SyntaxAfterEdit(String),

    /// `replace_all_matching` had no matches left after filtering.
    #[error("no matches remain after filtering: {0}")]
    EmptyMatchSet(String),

    /// Unknown template, primitive op, or composed operator name.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// `reorder_children` permutation length did not match the filtered
    /// child count (see DESIGN.md's resolution of the third open question).
    #[error("permutation length {given} does not match child count {expected}")]
    PermutationLengthMismatch { given: usize, expected: usize },

    #[error("filesystem failure: {0}")]
    Filesystem(String),
}

pub type Result<T> = std::result::Result<T, Error>;
