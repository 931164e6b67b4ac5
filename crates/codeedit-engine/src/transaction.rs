//! Transactional protocol wrapping the primitive mutators: snapshot,
//! precondition, apply, postcondition, rollback-on-failure.
//!
//! ARCHITECTURE: the six primitives in `mutate` are pure byte-buffer
//! functions; this module is the only place that touches the filesystem for
//! edits, mirroring the crate-level split between pure logic and I/O.

use crate::error::Result;
use crate::mutate::LineRange;
use crate::verify::post;
use crate::verify::{Finding, Severity};
use codeedit_core::{has_error_nodes, Language, Parser};
use std::path::Path;

/// Outcome of one transactional primitive application - mirrors the
/// `{success, error?, rolled_back?, result?}` Execution result JSON shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub rolled_back: bool,
    pub line_range: Option<LineRange>,
    pub warnings: Vec<String>,
}

/// Configuration for the extra post-edit layers (K, C, R, I, N) to run
/// beyond the always-on L0 syntax check.
#[derive(Default)]
pub struct PostEditChecks<'a> {
    pub expected_kind: Option<&'a str>,
    /// Byte offset, in the *pre-edit* buffer, marking the end of the region
    /// the primitive targeted - set by every primitive call site that knows
    /// which node it touched, so C runs for every primitive rather than
    /// none of them.
    pub containment_boundary: Option<usize>,
    pub run_non_triviality: bool,
    pub run_referential_integrity: bool,
    pub run_import_closure: bool,
}

/// Read `path`'s current bytes, write `new_bytes`, run post-edit layers
/// against the result, and roll back to the original bytes on any failure.
pub fn commit(
    path: &Path,
    language: Language,
    original: &[u8],
    new_bytes: Vec<u8>,
    line_range: LineRange,
    checks: PostEditChecks<'_>,
) -> Result<TransactionOutcome> {
    std::fs::write(path, &new_bytes)?;

    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&new_bytes)?;

    let mut findings: Vec<Finding> = Vec::new();

    if has_error_nodes(&tree) {
        findings.push(Finding::error(
            "L0",
            "post-edit file contains syntax errors",
        ));
    } else {
        if let Some(expected) = checks.expected_kind {
            findings.extend(post::check_kind_preservation(&tree, &new_bytes, line_range, expected));
        }
        if let Some(boundary) = checks.containment_boundary {
            let containment = post::ContainmentCheck::conservative(language, boundary, original.len(), new_bytes.len());
            findings.extend(post::check_containment(original, &new_bytes, containment));
        }
        if checks.run_non_triviality {
            findings.extend(post::check_non_triviality(&tree, &new_bytes, line_range));
        }
        if checks.run_referential_integrity {
            findings.extend(post::check_referential_integrity(&tree, &new_bytes, line_range));
        }
        if checks.run_import_closure {
            let graph = codeedit_core::build_graph(std::slice::from_ref(&path.to_path_buf()));
            findings.extend(post::check_import_closure(&tree, &new_bytes, line_range, &graph, path));
        }
    }

    let has_error = findings.iter().any(|f| f.severity == Severity::Error);

    if has_error {
        std::fs::write(path, original)?;
        let message = findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .map(|f| f.message.clone())
            .collect::<Vec<_>>()
            .join("; ");
        return Ok(TransactionOutcome {
            success: false,
            error: Some(message),
            rolled_back: true,
            line_range: None,
            warnings: Vec::new(),
        });
    }

    let warnings = findings
        .into_iter()
        .filter(|f| f.severity == Severity::Warning)
        .map(|f| f.message)
        .collect();

    Ok(TransactionOutcome {
        success: true,
        error: None,
        rolled_back: false,
        line_range: Some(line_range),
        warnings,
    })
}
