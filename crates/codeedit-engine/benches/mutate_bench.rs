//! Benchmarks for the six primitive mutators, including
//! `replace_all_matching`'s bottom-up rewrite over an N-match file.

use codeedit_core::{Language, Parser};
use codeedit_engine::mutate::{delete_node, insert_after_node, replace_all_matching, replace_node};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tree_sitter::Node;

fn generate_module(num_statements: usize) -> String {
    let mut src = String::from("def f():\n");
    for i in 0..num_statements {
        src.push_str(&format!("    x_{i} = FOO + FOO\n"));
    }
    src
}

fn collect_identifier_matches<'a>(tree: &'a tree_sitter::Tree, source: &[u8], name: &str) -> Vec<Node<'a>> {
    let mut cursor = tree.walk();
    let mut out = Vec::new();
    walk(&mut cursor, source, name, &mut out);
    out
}

fn walk<'a>(cursor: &mut tree_sitter::TreeCursor<'a>, source: &[u8], name: &str, out: &mut Vec<Node<'a>>) {
    loop {
        let node = cursor.node();
        if node.kind() == "identifier" && node.utf8_text(source) == Ok(name) {
            out.push(node);
        }
        if cursor.goto_first_child() {
            walk(cursor, source, name, out);
            cursor.goto_parent();
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

fn bench_replace_node(c: &mut Criterion) {
    let source = generate_module(500).into_bytes();
    let mut parser = Parser::new(Language::Python).expect("create parser");
    let tree = parser.parse(&source).expect("parse fixture");
    let target = tree
        .root_node()
        .named_child(0)
        .expect("function")
        .child_by_field_name("body")
        .expect("body")
        .named_child(0)
        .expect("first statement");

    c.bench_function("replace_node", |b| {
        b.iter(|| black_box(replace_node(&source, target, "x_0 = 1")));
    });
}

fn bench_insert_after_node(c: &mut Criterion) {
    let source = generate_module(500).into_bytes();
    let mut parser = Parser::new(Language::Python).expect("create parser");
    let tree = parser.parse(&source).expect("parse fixture");
    let target = tree
        .root_node()
        .named_child(0)
        .expect("function")
        .child_by_field_name("body")
        .expect("body")
        .named_child(0)
        .expect("first statement");

    c.bench_function("insert_after_node", |b| {
        b.iter(|| black_box(insert_after_node(&source, target, "y = 2")));
    });
}

fn bench_delete_node(c: &mut Criterion) {
    let source = generate_module(500).into_bytes();
    let mut parser = Parser::new(Language::Python).expect("create parser");
    let tree = parser.parse(&source).expect("parse fixture");
    let target = tree
        .root_node()
        .named_child(0)
        .expect("function")
        .child_by_field_name("body")
        .expect("body")
        .named_child(0)
        .expect("first statement");

    c.bench_function("delete_node", |b| {
        b.iter(|| black_box(delete_node(&source, target)));
    });
}

fn bench_replace_all_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_all_matching");

    for size in [10, 100, 1_000] {
        let source = generate_module(size).into_bytes();
        let mut parser = Parser::new(Language::Python).expect("create parser");
        let tree = parser.parse(&source).expect("parse fixture");
        let matches = collect_identifier_matches(&tree, &source, "FOO");

        group.bench_with_input(BenchmarkId::from_parameter(size), &matches, |b, matches| {
            b.iter(|| black_box(replace_all_matching(&source, matches, "BAR", false)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_replace_node,
    bench_insert_after_node,
    bench_delete_node,
    bench_replace_all_matching
);
criterion_main!(benches);
