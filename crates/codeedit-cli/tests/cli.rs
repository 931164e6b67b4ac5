use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bin() -> Command {
    Command::cargo_bin("codeedit").unwrap()
}

#[test]
fn build_graph_emits_symbols_for_a_python_file() {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    writeln!(file, "def foo():\n    pass\n").unwrap();

    bin()
        .arg("build_graph")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"foo\""));
}

#[test]
fn build_graph_rejects_missing_files_without_crashing() {
    bin()
        .arg("build_graph")
        .arg("/nonexistent/path/does_not_exist.py")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"errors\""));
}

#[test]
fn verify_plan_reports_failure_for_a_locator_that_does_not_resolve() {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    writeln!(file, "def foo():\n    pass\n").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let plan = serde_json::json!([
        {
            "op": "replace_node",
            "target": {"kind": "function", "name": "does_not_exist", "file": path},
            "params": {"replacement": "def does_not_exist():\n    return 1"}
        }
    ]);
    let graph = serde_json::json!({"symbols": [], "imports": [], "errors": []});

    bin()
        .arg("verify_plan")
        .arg(plan.to_string())
        .arg(graph.to_string())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"passed\": false"));
}

#[test]
fn verify_plan_passes_for_a_resolvable_locator() {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    writeln!(file, "def foo():\n    pass\n").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let plan = serde_json::json!([
        {
            "op": "replace_node",
            "target": {"kind": "function", "name": "foo", "file": path},
            "params": {"replacement": "def foo():\n    return 1"}
        }
    ]);
    let graph = serde_json::json!({"symbols": [], "imports": [], "errors": []});

    bin()
        .arg("verify_plan")
        .arg(plan.to_string())
        .arg(graph.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"passed\": true"));
}

#[test]
fn execute_step_applies_a_replace_node_primitive() {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    writeln!(file, "def foo():\n    pass\n").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let step = serde_json::json!({
        "op": "replace_node",
        "target": {"kind": "function", "name": "foo", "file": path},
        "params": {"replacement": "def foo():\n    return 1"}
    });

    bin()
        .arg("execute_step")
        .arg(step.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains("return 1"));
}

#[test]
fn execute_step_exits_nonzero_and_rolls_back_on_a_syntax_breaking_edit() {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    writeln!(file, "def foo():\n    pass\n").unwrap();
    let path = file.path().to_str().unwrap().to_string();
    let original = std::fs::read_to_string(file.path()).unwrap();

    let step = serde_json::json!({
        "op": "replace_node",
        "target": {"kind": "function", "name": "foo", "file": path},
        "params": {"replacement": "def foo(:\n    (((("}
    });

    bin()
        .arg("execute_step")
        .arg(step.to_string())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"rolled_back\": true"));

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(contents, original);
}

#[test]
fn unknown_subcommand_prints_usage_and_exits_nonzero() {
    bin().arg("not_a_real_subcommand").assert().failure();
}
