//! End-to-end scenario tests, one per spec scenario: plan JSON in, file
//! bytes and/or verification result out, through the real filesystem.

use codeedit_engine::{interpreter, Plan};
use std::io::Write;

fn write_py(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn scenario_1_guard_clause_precedes_the_return_with_an_early_exit() {
    let file = write_py("def f(x):\n    return x.value\n");
    let path = file.path().to_str().unwrap().to_string();

    let plan_json = serde_json::json!([{
        "template": "guard_clause",
        "params": {
            "condition": "x is None",
            "guard_body": "return None",
            "target": {"kind": "function", "name": "f", "file": path, "field": "body"}
        }
    }]);
    let plan = Plan::from_json(&plan_json).unwrap();
    let outcome = interpreter::execute_step(&plan.steps[0], &plan).unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains("if x is None:"));
    assert!(contents.contains("    return None"));
    assert!(contents.contains("return x.value"));

    let graph = codeedit_core::build_graph(&[std::path::PathBuf::from(&path)]);
    let verification = interpreter::verify_plan(&plan, &graph);
    assert!(verification.verification.errors.is_empty());
}

#[test]
fn scenario_2_replace_all_matching_rewrites_bottom_up() {
    let file = write_py("a = FOO + FOO\nb = FOO * FOO\n");
    let path = file.path().to_str().unwrap().to_string();

    // `kind: "expression"` has no normalized mapping to a single node type
    // in this engine's locator vocabulary, so the matched-node set is built
    // through the sexp locator mode instead, matching every `identifier`.
    let plan_json = serde_json::json!([{
        "op": "replace_all_matching",
        "target": {"type": "sexp", "query": "(identifier) @id", "capture": "id", "file": path},
        "params": {"replacement": "BAR", "filter_not_in_string_or_comment": false}
    }]);
    let plan = Plan::from_json(&plan_json).unwrap();
    let outcome = interpreter::execute_step(&plan.steps[0], &plan).unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(contents, "a = BAR + BAR\nb = BAR * BAR\n");
}

#[test]
fn scenario_3_rollback_on_syntax_break_leaves_file_unchanged() {
    let file = write_py("def f():\n    return 1\n");
    let path = file.path().to_str().unwrap().to_string();
    let original = std::fs::read_to_string(file.path()).unwrap();

    let plan_json = serde_json::json!([{
        "op": "replace_node",
        "target": {"kind": "statement", "file": path},
        "params": {"replacement": "return ("}
    }]);
    let plan = Plan::from_json(&plan_json).unwrap();
    let outcome = interpreter::execute_step(&plan.steps[0], &plan).unwrap();

    assert!(!outcome.success);
    assert!(outcome.rolled_back);

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(contents, original);
}

#[test]
fn scenario_4_fragment_round_trip_reparses_to_an_if_statement() {
    let fragment_value = serde_json::json!({
        "kind": "if_statement",
        "condition": "x > 0",
        "children": [{"kind": "return_statement", "value": "x"}]
    });
    let fragment = codeedit_engine::fragment::Fragment::from_value(&fragment_value).unwrap();
    let rendered = codeedit_engine::fragment::serialize(&fragment, 0).unwrap();
    assert_eq!(rendered, "if x > 0:\n    return x");

    let mut parser = codeedit_core::Parser::new(codeedit_core::Language::Python).unwrap();
    let tree = parser.parse(rendered.as_bytes()).unwrap();
    let if_node = tree.root_node().named_child(0).unwrap();
    assert_eq!(if_node.kind(), "if_statement");
    let condition = if_node.child_by_field_name("condition").unwrap();
    assert_eq!(condition.utf8_text(rendered.as_bytes()).unwrap(), "x > 0");
}

#[test]
fn scenario_5_cross_file_rename_warns_about_the_importing_file() {
    let a = write_py("def helper():\n    return 1\n");
    let a_path = a.path().to_path_buf();
    let b_dir = tempfile::tempdir().unwrap();
    let b_path = b_dir.path().join("b.py");
    std::fs::write(&b_path, "from a import helper\n").unwrap();

    let plan_json = serde_json::json!([{
        "op": "rename",
        "target": {"kind": "function", "name": "helper", "file": a_path},
        "new_name": "helper_v2"
    }]);
    let plan = Plan::from_json(&plan_json).unwrap();
    let graph = codeedit_core::build_graph(&[a_path, b_path]);
    let verification = interpreter::verify_plan(&plan, &graph);

    assert!(verification
        .verification
        .warnings
        .iter()
        .any(|w| w.contains("b.py")));
}

#[test]
fn scenario_6_precondition_ambiguity_blocks_before_any_edit() {
    let file = write_py(
        "class C:\n    def foo(self):\n        return 1\n    def foo(self):\n        return 2\n",
    );
    let path = file.path().to_str().unwrap().to_string();
    let original = std::fs::read_to_string(file.path()).unwrap();

    let plan_json = serde_json::json!([{
        "op": "delete",
        "target": {"kind": "function", "name": "foo", "file": path}
    }]);
    let plan = Plan::from_json(&plan_json).unwrap();

    let graph = codeedit_core::build_graph(&[std::path::PathBuf::from(&path)]);
    let verification = interpreter::verify_plan(&plan, &graph);
    assert!(!verification.verification.passed);
    assert!(verification
        .verification
        .errors
        .iter()
        .any(|e| e.contains("L0a")));

    let result = interpreter::execute_step(&plan.steps[0], &plan);
    assert!(matches!(result, Err(codeedit_engine::Error::LocatorAmbiguous(_))));

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(contents, original);
}
