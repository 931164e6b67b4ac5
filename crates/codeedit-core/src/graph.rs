//! Graph Builder - parses a set of files and extracts symbols, imports, and
//! per-line construct tags.
//!
//! ARCHITECTURE: every stage (symbol query, import query, line-kind walk) is
//! fenced independently per file so that one broken query never discards
//! results collected in an earlier stage, and one unreadable/unsupported
//! file never aborts the batch - it is recorded in `Graph.errors` instead.

use crate::language::{self, Language, SymbolKind};
use crate::parser::Parser;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Query, QueryCursor};

/// Kind of a symbol recorded in the graph: a flattened view of
/// `SymbolKind` (function/class/type) used at the data-model boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphSymbolKind {
    Class,
    Function,
    Type,
}

/// A function, class, or type definition discovered while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: GraphSymbolKind,
    pub file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
}

/// An import statement discovered while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub file: PathBuf,
    pub module: String,
    pub symbol: Option<String>,
    pub line: usize,
}

/// A non-fatal diagnostic recorded instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphError {
    pub file: PathBuf,
    pub message: String,
}

/// The aggregate output of the Graph Builder.
///
/// Only `Serialize`: `line_kinds` borrows `&'static str` construct tags that
/// cannot be reconstructed from JSON, so a CLI consumer that reads a
/// previously-serialized graph builds a fresh `Graph` from `symbols`/
/// `imports`/`errors` alone, with `line_kinds` left empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    /// file -> (1-indexed line -> normalized construct tag)
    pub line_kinds: FxHashMap<PathBuf, FxHashMap<usize, &'static str>>,
    pub errors: Vec<GraphError>,
}

/// Build a graph from a list of file paths.
///
/// Never returns `Err`: unreadable files or unsupported languages are
/// recorded in `Graph.errors` and the batch continues. Each file is
/// processed independently, so the batch is built in parallel and folded
/// into one `Graph` afterward.
pub fn build_graph(paths: &[PathBuf]) -> Graph {
    let per_file: Vec<Graph> = paths.par_iter().map(|path| build_graph_for_file(path)).collect();

    let mut graph = Graph::default();
    for fragment in per_file {
        graph.symbols.extend(fragment.symbols);
        graph.imports.extend(fragment.imports);
        graph.line_kinds.extend(fragment.line_kinds);
        graph.errors.extend(fragment.errors);
    }
    graph
}

/// Process one file into its own `Graph` fragment, never failing: every
/// fallible stage records a `GraphError` on this fragment instead of
/// aborting, so a broken query never discards results an earlier stage in
/// the same file already collected.
fn build_graph_for_file(path: &Path) -> Graph {
    let mut graph = Graph::default();

    let language = match Language::from_path(path) {
        Some(language) => language,
        None => {
            graph.errors.push(GraphError {
                file: path.to_path_buf(),
                message: format!("unsupported language for file: {}", path.display()),
            });
            return graph;
        }
    };

    let source = match std::fs::read(path) {
        Ok(source) => source,
        Err(e) => {
            graph.errors.push(GraphError {
                file: path.to_path_buf(),
                message: format!("failed to read file: {e}"),
            });
            return graph;
        }
    };

    let tree = match Parser::new(language).and_then(|mut parser| parser.parse(&source)) {
        Ok(tree) => tree,
        Err(e) => {
            graph.errors.push(GraphError {
                file: path.to_path_buf(),
                message: format!("failed to parse: {e}"),
            });
            return graph;
        }
    };

    if let Err(e) = collect_symbols(language, &source, &tree, path, &mut graph) {
        graph.errors.push(GraphError {
            file: path.to_path_buf(),
            message: format!("symbol query failed: {e}"),
        });
    }

    if let Err(e) = collect_imports(language, &source, &tree, path, &mut graph) {
        graph.errors.push(GraphError {
            file: path.to_path_buf(),
            message: format!("import query failed: {e}"),
        });
    }

    collect_line_kinds(language, &tree, path, &mut graph);

    graph
}

fn collect_symbols(
    language: Language,
    source: &[u8],
    tree: &tree_sitter::Tree,
    path: &Path,
    graph: &mut Graph,
) -> Result<(), String> {
    let query_src = language::symbol_query(language);
    let query = Query::new(&language.to_tree_sitter(), query_src)
        .map_err(|e| format!("invalid symbol query: {e}"))?;

    let name_idx = query
        .capture_index_for_name("name")
        .ok_or_else(|| "symbol query missing @name capture".to_string())?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    while let Some(m) = matches.next() {
        let Some(name_capture) = m.captures.iter().find(|c| c.index == name_idx) else {
            continue;
        };
        let name_text = name_capture
            .node
            .utf8_text(source)
            .unwrap_or_default()
            .to_string();

        // Find the innermost `*.def`-tagged capture in this match other
        // than the name capture itself, to classify function/class/type.
        let def_kind = m.captures.iter().find_map(|c| {
            if c.index == name_idx {
                return None;
            }
            let capture_name = query.capture_names()[c.index as usize];
            match capture_name {
                "function.def" => Some(SymbolKind::Function),
                "class.def" => Some(SymbolKind::Class),
                "type.def" => Some(SymbolKind::Type),
                _ => None,
            }
        });

        let Some(def_kind) = def_kind else { continue };
        let def_node = m
            .captures
            .iter()
            .find(|c| {
                matches!(
                    query.capture_names()[c.index as usize],
                    "function.def" | "class.def" | "type.def"
                )
            })
            .map(|c| c.node);
        let Some(def_node) = def_node else { continue };

        graph.symbols.push(Symbol {
            name: name_text,
            kind: match def_kind {
                SymbolKind::Function => GraphSymbolKind::Function,
                SymbolKind::Class => GraphSymbolKind::Class,
                SymbolKind::Type => GraphSymbolKind::Type,
            },
            file: path.to_path_buf(),
            start_line: def_node.start_position().row + 1,
            end_line: def_node.end_position().row + 1,
        });
    }

    Ok(())
}

fn collect_imports(
    language: Language,
    source: &[u8],
    tree: &tree_sitter::Tree,
    path: &Path,
    graph: &mut Graph,
) -> Result<(), String> {
    let query_src = language::import_query(language);
    let query = Query::new(&language.to_tree_sitter(), query_src)
        .map_err(|e| format!("invalid import query: {e}"))?;

    let import_idx = query
        .capture_index_for_name("import")
        .ok_or_else(|| "import query missing @import capture".to_string())?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    while let Some(m) = matches.next() {
        let Some(capture) = m.captures.iter().find(|c| c.index == import_idx) else {
            continue;
        };
        let text = capture.node.utf8_text(source).unwrap_or_default();
        let line = capture.node.start_position().row + 1;

        if let Some((module, symbol)) = parse_import_text(language, text) {
            graph.imports.push(Import {
                file: path.to_path_buf(),
                module,
                symbol,
                line,
            });
        }
    }

    Ok(())
}

/// Extract `(module, symbol)` from the raw text of a matched import node.
///
/// `symbol` is `None` for a bare module import (`import os`, `use std::fmt;`
/// without a leading path segment split). This is a best-effort text
/// regex-style parse, not a full grammar - good enough for graph queries
/// and L6 cross-file-impact checks, not for code generation.
fn parse_import_text(language: Language, text: &str) -> Option<(String, Option<String>)> {
    let text = text.trim().trim_end_matches(';').trim();

    match language {
        Language::Python => {
            if let Some(rest) = text.strip_prefix("from ") {
                let mut parts = rest.splitn(2, " import ");
                let module = parts.next()?.trim().to_string();
                let symbol = parts.next().map(|s| s.trim().to_string());
                Some((module, symbol))
            } else {
                let rest = text.strip_prefix("import ")?;
                let module = rest.split(" as ").next()?.trim().to_string();
                Some((module, None))
            }
        }
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            let from_idx = text.rfind(" from ")?;
            let module = text[from_idx + 6..]
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string();
            let clause = text["import".len()..from_idx].trim();
            let symbol = if clause.is_empty() { None } else { Some(clause.to_string()) };
            Some((module, symbol))
        }
        Language::Java => {
            let rest = text.strip_prefix("import ")?.trim_start_matches("static ");
            let (module, symbol) = match rest.rsplit_once('.') {
                Some((m, s)) => (m.to_string(), Some(s.to_string())),
                None => (rest.to_string(), None),
            };
            Some((module, symbol))
        }
        Language::Go => {
            let stripped = text.trim_matches('"');
            Some((stripped.to_string(), None))
        }
        Language::Rust => {
            let rest = text.strip_prefix("use ")?.trim();
            match rest.rsplit_once("::") {
                Some((module, symbol)) => Some((module.to_string(), Some(symbol.to_string()))),
                None => Some((rest.to_string(), None)),
            }
        }
        Language::Ruby => {
            let start = text.find('(').or_else(|| text.find(' '))?;
            let arg = text[start..]
                .trim_matches(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .trim_matches(|c| c == '\'' || c == '"');
            Some((arg.to_string(), None))
        }
        Language::Php => {
            let rest = text.strip_prefix("use ")?.trim();
            match rest.rsplit_once('\\') {
                Some((module, symbol)) => Some((module.to_string(), Some(symbol.to_string()))),
                None => Some((rest.to_string(), None)),
            }
        }
        Language::C | Language::Cpp => {
            let header = text
                .trim_start_matches("#include")
                .trim()
                .trim_matches(|c| c == '<' || c == '>' || c == '"');
            Some((header.to_string(), None))
        }
    }
}

fn collect_line_kinds(
    language: Language,
    tree: &tree_sitter::Tree,
    path: &Path,
    graph: &mut Graph,
) {
    let mut per_file = FxHashMap::default();
    let mut cursor = tree.walk();
    walk_for_line_kinds(language, &mut cursor, &mut per_file);
    graph.line_kinds.insert(path.to_path_buf(), per_file);
}

fn walk_for_line_kinds(
    language: Language,
    cursor: &mut tree_sitter::TreeCursor,
    out: &mut FxHashMap<usize, &'static str>,
) {
    loop {
        let node = cursor.node();
        if let Some(tag) = language::line_kind(language, node.kind()) {
            out.entry(node.start_position().row + 1).or_insert(tag);
        }

        if cursor.goto_first_child() {
            walk_for_line_kinds(language, cursor, out);
            cursor.goto_parent();
        }

        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn builds_graph_for_python_function_and_class() {
        let file = write_temp(
            "import os\n\nclass Foo:\n    def bar(self):\n        pass\n",
            ".py",
        );
        let graph = build_graph(&[file.path().to_path_buf()]);

        assert!(graph.errors.is_empty(), "{:?}", graph.errors);
        assert!(graph.symbols.iter().any(|s| s.name == "Foo" && s.kind == GraphSymbolKind::Class));
        assert!(graph.symbols.iter().any(|s| s.name == "bar" && s.kind == GraphSymbolKind::Function));
        assert!(graph.imports.iter().any(|i| i.module == "os"));
    }

    #[test]
    fn records_error_for_unreadable_file_without_aborting_batch() {
        let good = write_temp("def f():\n    pass\n", ".py");
        let missing = PathBuf::from("/nonexistent/path/does_not_exist.py");

        let graph = build_graph(&[good.path().to_path_buf(), missing]);

        assert_eq!(graph.errors.len(), 1);
        assert!(graph.symbols.iter().any(|s| s.name == "f"));
    }

    #[test]
    fn populates_line_kinds_for_if_statement() {
        let file = write_temp("if True:\n    pass\n", ".py");
        let graph = build_graph(&[file.path().to_path_buf()]);
        let kinds = graph.line_kinds.get(file.path()).unwrap();
        assert_eq!(kinds.get(&1), Some(&"if_statement"));
    }
}
