//! Locator Resolver - resolves a structural locator to zero or more AST nodes.
//!
//! ARCHITECTURE: grounded on the general shape of a `Selector` held
//! alongside a live tree-sitter tree, generalized into a single-purpose
//! module (no internal sub-selector abstraction layer) matching the
//! one-file-per-concern style the rest of this crate follows.
//!
//! A locator is resolved fresh against a freshly-parsed tree every call -
//! there is no cross-step parse-tree cache (see the Concurrency & Resource
//! Model's "parser cache" non-goal: re-parsing is cheap enough that caching
//! is not worth the complexity).

use crate::error::{Error, Result};
use codeedit_core::{node_types, Language, NormalizedKind};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// A structural address of zero or more AST nodes.
#[derive(Debug, Clone)]
pub enum Locator {
    /// Raw S-expression query mode: `{type: "sexp", query, capture}`.
    Sexp {
        query: String,
        capture: String,
        file: Option<PathBuf>,
    },
    /// Structured kind/name/parent/field/nth_child/index mode.
    Structured(StructuredLocator),
}

#[derive(Debug, Clone)]
pub struct StructuredLocator {
    pub kind: Option<NormalizedKind>,
    pub name: Option<String>,
    pub file: PathBuf,
    pub parent: Option<Box<Locator>>,
    pub field: Option<String>,
    pub nth_child: Option<i64>,
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawLocator {
    #[serde(rename = "type")]
    type_tag: Option<String>,
    query: Option<String>,
    capture: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    file: Option<PathBuf>,
    parent: Option<Box<Value>>,
    field: Option<String>,
    nth_child: Option<i64>,
    index: Option<usize>,
}

fn parse_normalized_kind(s: &str) -> Option<NormalizedKind> {
    match s {
        "function" => Some(NormalizedKind::Function),
        "class" => Some(NormalizedKind::Class),
        "method" => Some(NormalizedKind::Method),
        "import" => Some(NormalizedKind::Import),
        "statement" => Some(NormalizedKind::Statement),
        "interface" => Some(NormalizedKind::Interface),
        "enum" => Some(NormalizedKind::Enum),
        _ => None,
    }
}

impl Locator {
    /// Parse a locator from its JSON representation.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawLocator = serde_json::from_value(value.clone())?;

        if raw.type_tag.as_deref() == Some("sexp") {
            let query = raw
                .query
                .ok_or_else(|| Error::ParamValidation("sexp locator missing query".into()))?;
            let capture = raw
                .capture
                .ok_or_else(|| Error::ParamValidation("sexp locator missing capture".into()))?;
            return Ok(Locator::Sexp {
                query,
                capture,
                file: raw.file,
            });
        }

        let file = raw
            .file
            .ok_or_else(|| Error::ParamValidation("locator missing mandatory file".into()))?;

        let kind = match raw.kind {
            Some(k) => Some(
                parse_normalized_kind(&k)
                    .ok_or_else(|| Error::ParamValidation(format!("unknown locator kind: {k}")))?,
            ),
            None => None,
        };

        let parent = match raw.parent {
            Some(p) => Some(Box::new(Locator::from_value(&p)?)),
            None => None,
        };

        Ok(Locator::Structured(StructuredLocator {
            kind,
            name: raw.name,
            file,
            parent,
            field: raw.field,
            nth_child: raw.nth_child,
            index: raw.index,
        }))
    }

    /// The file this locator (or its innermost structured ancestor) targets.
    pub fn file(&self) -> Option<&Path> {
        match self {
            Locator::Sexp { file, .. } => file.as_deref(),
            Locator::Structured(s) => Some(&s.file),
        }
    }
}

/// Resolve `locator` against `override_file` (if given) or the locator's own
/// file, returning the matched nodes in document order.
///
/// Returns `Ok(vec![])` rather than `Err` when the language lacks a mapping
/// for the requested kind, or when parsing the file fails entirely at the
/// graceful-degradation boundary - callers distinguish "no match" from
/// "error" only at the primitive precondition layer.
pub fn resolve<'a>(
    tree: &'a tree_sitter::Tree,
    source: &[u8],
    language: Language,
    locator: &Locator,
) -> Result<Vec<Node<'a>>> {
    match locator {
        Locator::Sexp { query, capture, .. } => resolve_sexp(tree, source, language, query, capture),
        Locator::Structured(s) => resolve_structured(tree, source, language, s),
    }
}

fn resolve_sexp<'a>(
    tree: &'a tree_sitter::Tree,
    source: &[u8],
    language: Language,
    query_src: &str,
    capture_name: &str,
) -> Result<Vec<Node<'a>>> {
    use streaming_iterator::StreamingIterator;
    use tree_sitter::{Query, QueryCursor};

    let query = Query::new(&language.to_tree_sitter(), query_src)
        .map_err(|e| Error::ParamValidation(format!("invalid sexp query: {e}")))?;
    let capture_idx = query
        .capture_index_for_name(capture_name)
        .ok_or_else(|| Error::ParamValidation(format!("unknown capture: {capture_name}")))?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);
    let mut out = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures.iter().filter(|c| c.index == capture_idx) {
            out.push(capture.node);
        }
    }
    Ok(out)
}

fn resolve_structured<'a>(
    tree: &'a tree_sitter::Tree,
    source: &[u8],
    language: Language,
    locator: &StructuredLocator,
) -> Result<Vec<Node<'a>>> {
    let roots: Vec<Node<'a>> = match &locator.parent {
        Some(parent) => resolve(tree, source, language, parent)?,
        None => vec![tree.root_node()],
    };

    let target_types: &[&str] = match locator.kind {
        Some(kind) => node_types(kind, language),
        None => &[],
    };
    if locator.kind.is_some() && target_types.is_empty() {
        return Ok(vec![]);
    }

    let mut matches = Vec::new();
    for root in roots {
        collect_matches(root, locator, target_types, source, &mut matches);
    }

    if let Some(field) = &locator.field {
        matches = matches
            .into_iter()
            .filter_map(|n| n.child_by_field_name(field))
            .collect();
    }

    if let Some(nth) = locator.nth_child {
        matches = matches
            .into_iter()
            .filter_map(|n| nth_non_delimiter_child(n, nth))
            .collect();
    }

    if let Some(index) = locator.index {
        return Ok(matches.into_iter().nth(index).into_iter().collect());
    }

    Ok(matches)
}

fn collect_matches<'a>(
    root: Node<'a>,
    locator: &StructuredLocator,
    target_types: &[&str],
    source: &[u8],
    out: &mut Vec<Node<'a>>,
) {
    let mut cursor = root.walk();
    collect_matches_rec(&mut cursor, locator, target_types, source, out, true);
}

fn collect_matches_rec<'a>(
    cursor: &mut tree_sitter::TreeCursor<'a>,
    locator: &StructuredLocator,
    target_types: &[&str],
    source: &[u8],
    out: &mut Vec<Node<'a>>,
    is_root: bool,
) {
    let node = cursor.node();

    if !is_root {
        let type_matches = locator.kind.is_none() || target_types.contains(&node.kind());
        if type_matches {
            let name_matches = match &locator.name {
                None => true,
                Some(expected) => node_name(node, source).as_deref() == Some(expected.as_str()),
            };
            if name_matches && (locator.kind.is_some() || locator.name.is_some()) {
                out.push(node);
            }
        }
    }

    if cursor.goto_first_child() {
        loop {
            collect_matches_rec(cursor, locator, target_types, source, out, false);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

/// Extract the name of a definition node: the `name` field if present,
/// otherwise (C/C++) the identifier at the end of a `declarator -> declarator`
/// chain.
fn node_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(source).ok().map(str::to_string);
    }

    let mut declarator = node.child_by_field_name("declarator")?;
    loop {
        if declarator.kind() == "identifier" {
            return declarator.utf8_text(source).ok().map(str::to_string);
        }
        match declarator.child_by_field_name("declarator") {
            Some(next) => declarator = next,
            None => return declarator.utf8_text(source).ok().map(str::to_string),
        }
    }
}

/// Select the n-th non-delimiter (named) child; negative indexes count from
/// the end. Comment and anonymous punctuation/delimiter tokens are skipped.
fn nth_non_delimiter_child(node: Node<'_>, nth: i64) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let children: Vec<Node> = node
        .children(&mut cursor)
        .filter(|c| c.is_named() && c.kind() != "comment")
        .collect();

    let len = children.len() as i64;
    let idx = if nth < 0 { len + nth } else { nth };
    if idx < 0 || idx >= len {
        return None;
    }
    children.into_iter().nth(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeedit_core::Parser;

    #[test]
    fn resolves_function_by_name() {
        let source = b"def foo():\n    pass\n\ndef bar():\n    pass\n";
        let mut parser = Parser::new(Language::Python).unwrap();
        let tree = parser.parse(source).unwrap();

        let locator = Locator::Structured(StructuredLocator {
            kind: Some(NormalizedKind::Function),
            name: Some("bar".to_string()),
            file: PathBuf::from("x.py"),
            parent: None,
            field: None,
            nth_child: None,
            index: None,
        });

        let matches = resolve(&tree, source, Language::Python, &locator).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind(), "function_definition");
    }

    #[test]
    fn nth_child_negative_one_is_last() {
        let source = b"def foo(a, b, c):\n    pass\n";
        let mut parser = Parser::new(Language::Python).unwrap();
        let tree = parser.parse(source).unwrap();

        let params_locator = Locator::Structured(StructuredLocator {
            kind: Some(NormalizedKind::Function),
            name: Some("foo".to_string()),
            file: PathBuf::from("x.py"),
            parent: None,
            field: Some("parameters".to_string()),
            nth_child: Some(-1),
            index: None,
        });

        let matches = resolve(&tree, source, Language::Python, &params_locator).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].utf8_text(source).unwrap(), "c");
    }

    #[test]
    fn go_class_locator_returns_empty() {
        let source = b"package main\n\nfunc main() {}\n";
        let mut parser = Parser::new(Language::Go).unwrap();
        let tree = parser.parse(source).unwrap();

        let locator = Locator::Structured(StructuredLocator {
            kind: Some(NormalizedKind::Class),
            name: None,
            file: PathBuf::from("x.go"),
            parent: None,
            field: None,
            nth_child: None,
            index: None,
        });

        let matches = resolve(&tree, source, Language::Go, &locator).unwrap();
        assert!(matches.is_empty());
    }
}
