//! Benchmarks for Graph Builder throughput, scaling with file and symbol count.

use codeedit_core::build_graph;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::Write;

fn generate_python_module(num_functions: usize) -> String {
    let mut src = String::from("import os\nimport sys\n\n");
    for i in 0..num_functions {
        src.push_str(&format!(
            "def function_{i}(x, y):\n    if x > y:\n        return x\n    return y\n\n"
        ));
    }
    src
}

fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".py")
        .tempfile()
        .expect("create bench fixture");
    file.write_all(contents.as_bytes()).expect("write bench fixture");
    file
}

fn bench_build_graph_single_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph_single_file");

    for size in [10, 100, 1_000] {
        let source = generate_python_module(size);
        let fixture = write_fixture(&source);
        let path = fixture.path().to_path_buf();

        group.bench_with_input(BenchmarkId::from_parameter(size), &path, |b, path| {
            b.iter(|| black_box(build_graph(std::slice::from_ref(path))));
        });
    }

    group.finish();
}

fn bench_build_graph_many_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph_many_files");

    for file_count in [1, 10, 50] {
        let fixtures: Vec<_> = (0..file_count)
            .map(|_| write_fixture(&generate_python_module(20)))
            .collect();
        let paths: Vec<_> = fixtures.iter().map(|f| f.path().to_path_buf()).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &paths,
            |b, paths| {
                b.iter(|| black_box(build_graph(paths)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build_graph_single_file, bench_build_graph_many_files);
criterion_main!(benches);
