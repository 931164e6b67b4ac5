//! Integration tests for the Graph Builder across several languages.

use codeedit_core::{build_graph, GraphSymbolKind};
use std::io::Write;
use std::path::PathBuf;

fn write_fixture(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create fixture file");
    file.write_all(contents.as_bytes()).expect("write fixture");
    file
}

#[test]
fn rust_graph_extracts_functions_structs_and_imports() {
    let file = write_fixture(
        "use std::fmt;\n\nstruct Widget;\n\nfn build() -> Widget {\n    Widget\n}\n",
        ".rs",
    );
    let graph = build_graph(&[file.path().to_path_buf()]);

    assert!(graph.errors.is_empty(), "{:?}", graph.errors);
    assert!(graph
        .symbols
        .iter()
        .any(|s| s.name == "Widget" && s.kind == GraphSymbolKind::Class));
    assert!(graph
        .symbols
        .iter()
        .any(|s| s.name == "build" && s.kind == GraphSymbolKind::Function));
    assert!(graph.imports.iter().any(|i| i.module == "std::fmt" || i.module == "std"));
}

#[test]
fn go_graph_has_no_class_symbols() {
    let file = write_fixture(
        "package main\n\nimport \"fmt\"\n\nfunc Greet() {\n\tfmt.Println(\"hi\")\n}\n",
        ".go",
    );
    let graph = build_graph(&[file.path().to_path_buf()]);

    assert!(graph.errors.is_empty(), "{:?}", graph.errors);
    assert!(!graph.symbols.iter().any(|s| s.kind == GraphSymbolKind::Class));
    assert!(graph
        .symbols
        .iter()
        .any(|s| s.name == "Greet" && s.kind == GraphSymbolKind::Function));
}

#[test]
fn typescript_graph_extracts_interfaces_and_enums() {
    let file = write_fixture(
        "interface Shape {\n  area(): number;\n}\n\nenum Color { Red, Green }\n",
        ".ts",
    );
    let graph = build_graph(&[file.path().to_path_buf()]);

    assert!(graph.errors.is_empty(), "{:?}", graph.errors);
    assert!(graph
        .symbols
        .iter()
        .any(|s| s.name == "Shape" && s.kind == GraphSymbolKind::Type));
    assert!(graph
        .symbols
        .iter()
        .any(|s| s.name == "Color" && s.kind == GraphSymbolKind::Type));
}

#[test]
fn batch_continues_past_unsupported_language() {
    let good = write_fixture("def f():\n    pass\n", ".py");
    let unsupported = write_fixture("no language maps to this extension\n", ".xyz");

    let graph = build_graph(&[good.path().to_path_buf(), unsupported.path().to_path_buf()]);

    assert_eq!(graph.errors.len(), 1);
    assert!(graph.symbols.iter().any(|s| s.name == "f"));
}

#[test]
fn batch_continues_past_missing_file() {
    let good = write_fixture("fn main() {}\n", ".rs");
    let missing = PathBuf::from("/definitely/not/a/real/path/ghost.rs");

    let graph = build_graph(&[good.path().to_path_buf(), missing]);

    assert_eq!(graph.errors.len(), 1);
    assert!(graph.symbols.iter().any(|s| s.name == "main"));
}
