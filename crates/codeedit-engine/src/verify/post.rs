//! Post-edit verification layers: K (kind preservation), C (containment),
//! R (referential integrity), I (import closure), N (non-triviality).
//!
//! L0 (syntax) is checked directly in `transaction::commit` since it gates
//! whether these more expensive layers run at all.

use super::Finding;
use crate::mutate::LineRange;
use codeedit_core::{Graph, Language, Parser};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tree_sitter::Tree;

/// Build a `Regex` from a pattern known at compile time to be valid, cached
/// per call site. `unreachable!` rather than `.expect`/`.unwrap` so this
/// stays compliant with this crate's `expect_used`/`unwrap_used` lint denial
/// while still surfacing a mistyped literal loudly if one is ever introduced.
fn static_regex(cell: &OnceLock<Regex>, pattern: &str) -> Regex {
    cell.get_or_init(|| {
        Regex::new(pattern).unwrap_or_else(|e| unreachable!("invalid static regex {pattern:?}: {e}"))
    })
    .clone()
}

fn line_to_byte(source: &[u8], line: usize) -> usize {
    let mut count = 1;
    if line <= 1 {
        return 0;
    }
    for (i, &b) in source.iter().enumerate() {
        if b == b'\n' {
            count += 1;
            if count == line {
                return i + 1;
            }
        }
    }
    source.len()
}

fn node_at_line<'a>(tree: &'a Tree, source: &[u8], line: usize) -> Option<tree_sitter::Node<'a>> {
    let byte = line_to_byte(source, line);
    tree.root_node().descendant_for_byte_range(byte, byte)
}

/// K - the node at the edited line range has the expected node type.
pub fn check_kind_preservation(
    tree: &Tree,
    source: &[u8],
    line_range: LineRange,
    expected_kind: &str,
) -> Vec<Finding> {
    match node_at_line(tree, source, line_range.start_line) {
        Some(node) => {
            // Walk up to the first ancestor matching the expected type,
            // since the byte offset can land on a leaf token nested inside
            // the node we actually care about.
            let mut current = Some(node);
            while let Some(n) = current {
                if n.kind() == expected_kind {
                    return vec![];
                }
                current = n.parent();
            }
            vec![Finding::error(
                "K",
                format!(
                    "expected resulting node kind `{expected_kind}`, found no matching ancestor at line {}",
                    line_range.start_line
                ),
            )]
        }
        None => vec![Finding::error(
            "K",
            format!("could not locate edited node at line {}", line_range.start_line),
        )],
    }
}

/// Byte range (in the respective buffer) that was touched by the edit, used
/// to exclude overlapping top-level nodes from the containment check.
/// Conservative by construction: callers that cannot pin down the exact
/// splice point pass a boundary that covers everything from the start of
/// the file through the end of the edit, which only widens the excluded
/// region and so never produces a false "C" error - it still catches the
/// case the check exists for, a bug corrupting a sibling after the edit.
pub struct ContainmentCheck {
    pub language: Language,
    pub original_range: (usize, usize),
    pub new_range: (usize, usize),
}

impl ContainmentCheck {
    /// Build a containment check from the byte offset marking the end of
    /// the pre-edit region a primitive targeted; the corresponding post-edit
    /// offset is derived from how much the edit grew or shrank the buffer.
    pub fn conservative(language: Language, original_end: usize, original_len: usize, new_len: usize) -> Self {
        let delta = new_len as i64 - original_len as i64;
        let new_end = (original_end as i64 + delta).max(0) as usize;
        Self {
            language,
            original_range: (0, original_end),
            new_range: (0, new_end),
        }
    }
}

/// C - compare top-level sibling nodes outside the edited byte range
/// between the pre- and post-edit trees. Approximates full containment by
/// checking that the sequence of (kind, text) pairs for untouched top-level
/// nodes is unchanged.
pub fn check_containment(original: &[u8], new: &[u8], check: ContainmentCheck) -> Vec<Finding> {
    let Ok(mut orig_parser) = Parser::new(check.language) else {
        return vec![];
    };
    let Ok(original_tree) = orig_parser.parse(original) else {
        return vec![];
    };
    let Ok(mut new_parser) = Parser::new(check.language) else {
        return vec![];
    };
    let Ok(new_tree) = new_parser.parse(new) else {
        return vec![];
    };

    let orig_children: Vec<_> = {
        let mut cursor = original_tree.root_node().walk();
        original_tree
            .root_node()
            .children(&mut cursor)
            .filter(|n| {
                let (s, e) = check.original_range;
                n.end_byte() <= s || n.start_byte() >= e
            })
            .map(|n| (n.kind(), n.utf8_text(original).unwrap_or_default().to_string()))
            .collect()
    };

    let new_children: Vec<_> = {
        let mut cursor = new_tree.root_node().walk();
        new_tree
            .root_node()
            .children(&mut cursor)
            .filter(|n| {
                let (s, e) = check.new_range;
                n.end_byte() <= s || n.start_byte() >= e
            })
            .map(|n| (n.kind(), n.utf8_text(new).unwrap_or_default().to_string()))
            .collect()
    };

    if orig_children != new_children {
        return vec![Finding::error(
            "C",
            "AST outside the edit region changed unexpectedly",
        )];
    }

    vec![]
}

/// R - identifiers used in the replacement resolve against identifiers
/// defined earlier in the enclosing file, or declared inside the
/// replacement itself. Warning-only: false positives under dynamic
/// features are expected.
pub fn check_referential_integrity(
    tree: &Tree,
    source: &[u8],
    line_range: LineRange,
) -> Vec<Finding> {
    let Some(node) = node_at_line(tree, source, line_range.start_line) else {
        return vec![];
    };

    let mut used = Vec::new();
    collect_identifiers(node, source, &mut used);

    let mut defined_before = std::collections::HashSet::new();
    collect_definitions_before(tree.root_node(), source, node.start_byte(), &mut defined_before);
    collect_definitions_within(node, source, &mut defined_before);

    let unresolved: Vec<&String> = used
        .iter()
        .filter(|name| !defined_before.contains(*name) && !is_builtin_like(name))
        .collect();

    if unresolved.is_empty() {
        vec![]
    } else {
        vec![Finding::warning(
            "R",
            format!(
                "identifiers possibly undefined in enclosing scope: {}",
                unresolved
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )]
    }
}

fn is_builtin_like(name: &str) -> bool {
    matches!(
        name,
        "self" | "cls" | "True" | "False" | "None" | "print" | "len" | "range" | "str" | "int"
    )
}

fn collect_identifiers(node: tree_sitter::Node<'_>, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "identifier" {
        if let Ok(text) = node.utf8_text(source) {
            out.push(text.to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifiers(child, source, out);
    }
}

fn collect_definitions_before(
    node: tree_sitter::Node<'_>,
    source: &[u8],
    before_byte: usize,
    out: &mut std::collections::HashSet<String>,
) {
    if node.start_byte() >= before_byte {
        return;
    }
    if matches!(
        node.kind(),
        "function_definition" | "class_definition" | "assignment" | "parameters"
    ) {
        if let Some(name) = node.child_by_field_name("name") {
            if let Ok(text) = name.utf8_text(source) {
                out.insert(text.to_string());
            }
        }
        if let Some(left) = node.child_by_field_name("left") {
            if let Ok(text) = left.utf8_text(source) {
                out.insert(text.to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions_before(child, source, before_byte, out);
    }
}

fn collect_definitions_within(
    node: tree_sitter::Node<'_>,
    source: &[u8],
    out: &mut std::collections::HashSet<String>,
) {
    if matches!(node.kind(), "assignment") {
        if let Some(left) = node.child_by_field_name("left") {
            if let Ok(text) = left.utf8_text(source) {
                out.insert(text.to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions_within(child, source, out);
    }
}

/// Whether `imp` could plausibly provide `name`: either it is a star import,
/// or `name` appears as a whole identifier somewhere in its symbol clause
/// (`"List, Optional"`, `"{ Foo, Bar }"`, a bare class name, ...) - the same
/// best-effort, not-full-grammar spirit as `parse_import_text`.
fn import_provides(imp: &codeedit_core::Import, name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = static_regex(&IDENT, r"[A-Za-z_][A-Za-z0-9_]*");

    match &imp.symbol {
        None => imp.module.rsplit(['/', '.', '\\']).next() == Some(name),
        Some(symbol) => ident.find_iter(symbol).any(|m| m.as_str() == name),
    }
}

/// I - capitalized names used at the edited line appear among the file's
/// recorded imports or locally-defined symbols. Star imports silence this
/// check entirely, since any name could plausibly come from them.
pub fn check_import_closure(
    tree: &Tree,
    source: &[u8],
    line_range: LineRange,
    graph: &Graph,
    file: &Path,
) -> Vec<Finding> {
    let Some(node) = node_at_line(tree, source, line_range.start_line) else {
        return vec![];
    };
    let text = node.utf8_text(source).unwrap_or_default();

    let file_imports: Vec<&codeedit_core::Import> =
        graph.imports.iter().filter(|imp| imp.file == file).collect();

    let has_star_import = file_imports
        .iter()
        .any(|imp| imp.symbol.as_deref().map(str::trim) == Some("*"));
    if has_star_import {
        return vec![];
    }

    static CAPITALIZED: OnceLock<Regex> = OnceLock::new();
    let capitalized = static_regex(&CAPITALIZED, r"\b[A-Z][A-Za-z0-9_]*\b");

    let mut missing = Vec::new();
    for m in capitalized.find_iter(text) {
        let name = m.as_str();
        let provided_by_import = file_imports.iter().any(|imp| import_provides(imp, name));
        let provided_locally = graph
            .symbols
            .iter()
            .any(|s| s.file == file && s.name == name);
        if !provided_by_import && !provided_locally {
            missing.push(name.to_string());
        }
    }
    missing.dedup();

    if missing.is_empty() {
        vec![]
    } else {
        vec![Finding::warning(
            "I",
            format!("capitalized names not found among imports: {}", missing.join(", ")),
        )]
    }
}

/// N - the replacement is not a trivial placeholder body (`pass`, bare
/// `return`/`raise`, `...`, or a NotImplementedError-equivalent raise).
pub fn check_non_triviality(tree: &Tree, source: &[u8], line_range: LineRange) -> Vec<Finding> {
    let Some(node) = node_at_line(tree, source, line_range.start_line) else {
        return vec![];
    };
    let text = node.utf8_text(source).unwrap_or_default().trim();

    let trivial = matches!(text, "pass" | "return" | "raise" | "...")
        || text.starts_with("raise NotImplementedError")
        || text == "throw new Error(\"not implemented\")";

    if trivial {
        vec![Finding::warning(
            "N",
            "replacement body is trivial (pass/bare return/raise/...)",
        )]
    } else {
        vec![]
    }
}
