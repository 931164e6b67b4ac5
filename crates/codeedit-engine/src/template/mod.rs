//! Template Catalog - ~15 named edit patterns, each with a typed parameter
//! schema and a handler lowering it to one or more primitive calls.
//!
//! ARCHITECTURE: dynamic dispatch in the source (`OPERATOR_CATALOG_PROMPT`'s
//! flat dictionary of name -> handler) becomes a table keyed by template
//! name here, each entry a plain function - the design note's guidance to
//! replace dynamic handler lookup with a typed dispatch table per operator.

use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::mutate;
use crate::transaction::{self, PostEditChecks, TransactionOutcome};
use codeedit_core::{Language, Parser};
use serde_json::{Map, Value};

/// The fixed set of template names this catalog implements.
pub const TEMPLATE_NAMES: &[&str] = &[
    "guard_clause",
    "wrap_try_except",
    "add_parameter",
    "replace_expression",
    "extract_variable",
    "add_import_and_use",
    "add_method",
    "modify_condition",
    "add_conditional_branch",
    "replace_function_body",
    "wrap_context_manager",
    "add_decorator",
    "inline_variable",
    "change_return_value",
    "add_class_attribute",
];

pub fn is_known_template(name: &str) -> bool {
    TEMPLATE_NAMES.contains(&name)
}

fn get_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParamValidation(format!("missing required string param `{key}`")))
}

fn get_str_opt<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn get_locator(params: &Map<String, Value>, key: &str) -> Result<Locator> {
    let value = params
        .get(key)
        .ok_or_else(|| Error::ParamValidation(format!("missing required locator param `{key}`")))?;
    Locator::from_value(value)
}

/// Context shared by every template handler: the resolved target file's
/// language, original bytes, and parsed tree.
struct FileContext {
    path: std::path::PathBuf,
    language: Language,
    source: Vec<u8>,
    tree: tree_sitter::Tree,
}

fn load(locator: &Locator) -> Result<FileContext> {
    let path = locator
        .file()
        .ok_or_else(|| Error::ParamValidation("locator missing file".into()))?
        .to_path_buf();
    let language = Language::from_path(&path)
        .ok_or_else(|| Error::ParamValidation(format!("unsupported language: {}", path.display())))?;
    let source = std::fs::read(&path)?;
    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&source)?;
    Ok(FileContext {
        path,
        language,
        source,
        tree,
    })
}

fn resolve_unique<'a>(
    ctx: &'a FileContext,
    locator: &Locator,
) -> Result<tree_sitter::Node<'a>> {
    let matches = crate::locator::resolve(&ctx.tree, &ctx.source, ctx.language, locator)?;
    match matches.len() {
        0 => Err(Error::LocatorMiss(format!("{locator:?}"))),
        1 => Ok(matches[0]),
        _ => Err(Error::LocatorAmbiguous(format!("{locator:?}"))),
    }
}

fn first_of(ctx: &FileContext, locator: &Locator) -> Result<tree_sitter::Node<'_>> {
    let matches = crate::locator::resolve(&ctx.tree, &ctx.source, ctx.language, locator)?;
    matches.into_iter().next().ok_or_else(|| Error::LocatorMiss(format!("{locator:?}")))
}

/// Commit with the default bundle of post-edit checks for a template that
/// replaced or inserted text anchored at `node` (in the template's own
/// *original* tree - the containment boundary only needs to be "at least as
/// far as the edit reached," not byte-exact): C, R, N, and I.
fn commit_simple(
    ctx: &FileContext,
    node: tree_sitter::Node<'_>,
    new_bytes: Vec<u8>,
    line_range: mutate::LineRange,
) -> Result<TransactionOutcome> {
    transaction::commit(
        &ctx.path,
        ctx.language,
        &ctx.source,
        new_bytes,
        line_range,
        PostEditChecks {
            containment_boundary: Some(node.end_byte()),
            run_non_triviality: true,
            run_referential_integrity: true,
            run_import_closure: true,
            ..Default::default()
        },
    )
}

/// Dispatch a template step by name.
pub fn apply_template(name: &str, params: &Map<String, Value>) -> Result<TransactionOutcome> {
    match name {
        "guard_clause" => guard_clause(params),
        "wrap_try_except" => wrap_try_except(params),
        "add_parameter" => add_parameter(params),
        "replace_expression" => replace_expression(params),
        "extract_variable" => extract_variable(params),
        "add_import_and_use" => add_import_and_use(params),
        "add_method" => add_method(params),
        "modify_condition" => modify_condition(params),
        "add_conditional_branch" => add_conditional_branch(params),
        "replace_function_body" => replace_function_body(params),
        "wrap_context_manager" => wrap_context_manager(params),
        "add_decorator" => add_decorator(params),
        "inline_variable" => inline_variable(params),
        "change_return_value" => change_return_value(params),
        "add_class_attribute" => add_class_attribute(params),
        other => Err(Error::UnknownOperator(format!("unknown template: {other}"))),
    }
}

/// Prepend `if condition: guard_body` before the target statement.
fn guard_clause(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let condition = get_str(params, "condition")?;
    let guard_body = get_str(params, "guard_body")?;
    let target = get_locator(params, "target")?;

    let ctx = load(&target)?;
    let body_node = resolve_unique(&ctx, &target)?;
    let anchor = body_node
        .named_child(0)
        .ok_or_else(|| Error::ParamValidation("target body has no statements".into()))?;

    let text = format!("if {condition}:\n    {guard_body}");
    let (new_source, line_range) = mutate::insert_before_node(&ctx.source, anchor, &text);
    commit_simple(&ctx, anchor, new_source, line_range)
}

/// Wrap the target statement(s) in `try: ... except <exception_type>: <handler_body>`.
fn wrap_try_except(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let exception_type = get_str_opt(params, "exception_type").unwrap_or("Exception");
    let handler_body = get_str_opt(params, "handler_body").unwrap_or("raise");

    let ctx = load(&target)?;
    let node = resolve_unique(&ctx, &target)?;

    let after = format!("except {exception_type}:\n    {handler_body}");
    let (new_source, line_range) = mutate::wrap_node(&ctx.source, node, "try:", &after, true);
    commit_simple(&ctx, node, new_source, line_range)
}

/// Add a parameter to a function's parameter list.
fn add_parameter(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let parameter = get_str(params, "parameter")?;

    let ctx = load(&target)?;
    let params_node = resolve_unique(&ctx, &target)?;
    let text = params_node.utf8_text(&ctx.source).unwrap_or_default();

    let inner = text.trim_start_matches('(').trim_end_matches(')').trim();
    let replacement = if inner.is_empty() {
        format!("({parameter})")
    } else {
        format!("({inner}, {parameter})")
    };

    let (new_source, line_range) = mutate::replace_node(&ctx.source, params_node, &replacement);
    commit_simple(&ctx, params_node, new_source, line_range)
}

/// Swap one expression node for another.
fn replace_expression(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let replacement = get_str(params, "replacement")?;

    let ctx = load(&target)?;
    let node = resolve_unique(&ctx, &target)?;
    let (new_source, line_range) = mutate::replace_node(&ctx.source, node, replacement);
    commit_simple(&ctx, node, new_source, line_range)
}

/// Hoist an expression into a named binding inserted before the statement
/// that used it, then replace the usage site with the new variable.
fn extract_variable(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let statement = get_locator(params, "statement")?;
    let expression = get_locator(params, "expression")?;
    let variable_name = get_str(params, "variable_name")?;

    let ctx = load(&statement)?;
    let stmt_node = resolve_unique(&ctx, &statement)?;
    let expr_node = resolve_unique(&ctx, &expression)?;
    let expr_text = expr_node.utf8_text(&ctx.source).unwrap_or_default().to_string();

    let binding = format!("{variable_name} = {expr_text}");
    let (with_binding, _) = mutate::insert_before_node(&ctx.source, stmt_node, &binding);

    // Re-resolve the expression in the updated buffer before replacing it,
    // since insert_before shifted every downstream byte offset.
    let mut parser = Parser::new(ctx.language)?;
    let new_tree = parser.parse(&with_binding)?;
    let new_matches = crate::locator::resolve(&new_tree, &with_binding, ctx.language, &expression)?;
    let new_expr_node = new_matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::LocatorMiss("expression vanished after extract_variable insert".into()))?;

    let (final_source, line_range) = mutate::replace_node(&with_binding, new_expr_node, variable_name);
    commit_simple(&ctx, new_expr_node, final_source, line_range)
}

/// Add an import statement (delegating to the shared `add_import` composed
/// operator's idempotence rule) and a usage-site replacement.
fn add_import_and_use(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let import_statement = get_str(params, "import_statement")?;
    let usage_target = get_locator(params, "usage_target")?;
    let usage_replacement = get_str(params, "usage_replacement")?;

    let ctx = load(&usage_target)?;
    let already_present = String::from_utf8_lossy(&ctx.source).contains(import_statement);

    let source_after_import = if already_present {
        ctx.source.clone()
    } else {
        let root_first_child = ctx
            .tree
            .root_node()
            .named_child(0)
            .ok_or_else(|| Error::ParamValidation("target file is empty".into()))?;
        let (with_import, _) = mutate::insert_before_node(&ctx.source, root_first_child, import_statement);
        with_import
    };

    let mut parser = Parser::new(ctx.language)?;
    let tree_after_import = parser.parse(&source_after_import)?;
    let matches = crate::locator::resolve(&tree_after_import, &source_after_import, ctx.language, &usage_target)?;
    let usage_node = matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::LocatorMiss("usage target not found after import insertion".into()))?;

    let (final_source, line_range) = mutate::replace_node(&source_after_import, usage_node, usage_replacement);
    commit_simple(&ctx, usage_node, final_source, line_range)
}

/// Insert a method into a class body, after the last existing body child.
fn add_method(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let method_source = get_str(params, "method_source")?;

    let ctx = load(&target)?;
    let body_node = resolve_unique(&ctx, &target)?;
    let last_child = last_named_child(body_node)
        .ok_or_else(|| Error::ParamValidation("class body has no statements to anchor after".into()))?;

    let (new_source, line_range) = mutate::insert_after_node(&ctx.source, last_child, method_source);
    commit_simple(&ctx, last_child, new_source, line_range)
}

/// Replace the condition expression of an if/while/for statement.
fn modify_condition(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let new_condition = get_str(params, "new_condition")?;

    let ctx = load(&target)?;
    let condition_node = resolve_unique(&ctx, &target)?;
    let (new_source, line_range) = mutate::replace_node(&ctx.source, condition_node, new_condition);
    commit_simple(&ctx, condition_node, new_source, line_range)
}

/// Append an elif/else clause after the end of an if statement.
fn add_conditional_branch(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let branch_source = get_str(params, "branch_source")?;

    let ctx = load(&target)?;
    let if_node = resolve_unique(&ctx, &target)?;
    let (new_source, line_range) = mutate::insert_after_node(&ctx.source, if_node, branch_source);
    commit_simple(&ctx, if_node, new_source, line_range)
}

/// Swap a function body for a fragment, serialized at the body's indent.
fn replace_function_body(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let fragment_value = params
        .get("fragment")
        .ok_or_else(|| Error::ParamValidation("replace_function_body missing fragment".into()))?;

    let ctx = load(&target)?;
    let body_node = resolve_unique(&ctx, &target)?;

    let fragment = crate::fragment::Fragment::from_value(fragment_value)?;
    let rendered = crate::fragment::serialize(&fragment, 0)?;

    let (new_source, line_range) = mutate::replace_node(&ctx.source, body_node, &rendered);
    transaction::commit(
        &ctx.path,
        ctx.language,
        &ctx.source,
        new_source,
        line_range,
        PostEditChecks {
            expected_kind: Some(body_node.kind()),
            containment_boundary: Some(body_node.end_byte()),
            run_non_triviality: true,
            run_referential_integrity: true,
            run_import_closure: true,
            ..Default::default()
        },
    )
}

/// Wrap the target statement(s) in a `with` block.
fn wrap_context_manager(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let context_expr = get_str(params, "context_expr")?;
    let as_name = get_str_opt(params, "as_name");

    let ctx = load(&target)?;
    let node = resolve_unique(&ctx, &target)?;

    let before = match as_name {
        Some(name) => format!("with {context_expr} as {name}:"),
        None => format!("with {context_expr}:"),
    };

    let (new_source, line_range) = mutate::wrap_node(&ctx.source, node, &before, "", true);
    // wrap_node always emits a trailing "indent + after" line; an empty
    // `after` still leaves a blank line, so trim it back out here.
    let trimmed = strip_trailing_empty_wrap_line(&new_source, &ctx.source, node);
    commit_simple(&ctx, node, trimmed, line_range)
}

fn strip_trailing_empty_wrap_line(new_source: &[u8], _original: &[u8], _node: tree_sitter::Node<'_>) -> Vec<u8> {
    let text = String::from_utf8_lossy(new_source);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() && i > 0 && i + 1 < lines.len() {
            let prev_was_content = !lines[i - 1].trim().is_empty();
            let next_is_dedent = lines
                .get(i + 1)
                .map(|l| l.len() <= line.len())
                .unwrap_or(false);
            if prev_was_content && next_is_dedent && line.chars().all(|c| c == ' ') {
                continue;
            }
        }
        out.push(line);
    }
    out.join("\n").into_bytes()
}

/// Prepend a decorator line above a definition.
fn add_decorator(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let decorator = get_str(params, "decorator")?;

    let ctx = load(&target)?;
    let node = resolve_unique(&ctx, &target)?;
    let text = if decorator.starts_with('@') {
        decorator.to_string()
    } else {
        format!("@{decorator}")
    };
    let (new_source, line_range) = mutate::insert_before_node(&ctx.source, node, &text);
    commit_simple(&ctx, node, new_source, line_range)
}

/// Substitute a variable with its bound value at a use site, then delete
/// the original assignment.
fn inline_variable(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let assignment = get_locator(params, "assignment")?;
    let usage = get_locator(params, "usage")?;

    let ctx = load(&assignment)?;
    let assignment_node = resolve_unique(&ctx, &assignment)?;
    let value_node = assignment_node
        .child_by_field_name("right")
        .ok_or_else(|| Error::ParamValidation("assignment has no right-hand value".into()))?;
    let value_text = value_node.utf8_text(&ctx.source).unwrap_or_default().to_string();

    let usage_node = resolve_unique(&ctx, &usage)?;
    let (after_usage, _) = mutate::replace_node(&ctx.source, usage_node, &value_text);

    let mut parser = Parser::new(ctx.language)?;
    let tree_after_usage = parser.parse(&after_usage)?;
    let assignment_matches = crate::locator::resolve(&tree_after_usage, &after_usage, ctx.language, &assignment)?;
    let assignment_node_after = assignment_matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::LocatorMiss("assignment vanished after inline_variable usage replacement".into()))?;

    let (final_source, line_range) = mutate::delete_node(&after_usage, assignment_node_after);
    commit_simple(&ctx, assignment_node_after, final_source, line_range)
}

/// Swap the expression in a return statement.
fn change_return_value(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let new_value = get_str(params, "new_value")?;

    let ctx = load(&target)?;
    let return_node = resolve_unique(&ctx, &target)?;
    let replacement = format!("return {new_value}");
    let (new_source, line_range) = mutate::replace_node(&ctx.source, return_node, &replacement);
    commit_simple(&ctx, return_node, new_source, line_range)
}

/// Insert a class-level binding at the start of a class body, after the
/// docstring if one is present.
fn add_class_attribute(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target = get_locator(params, "target")?;
    let attribute_source = get_str(params, "attribute_source")?;

    let ctx = load(&target)?;
    let body_node = resolve_unique(&ctx, &target)?;

    let first = body_node
        .named_child(0)
        .ok_or_else(|| Error::ParamValidation("class body has no statements".into()))?;

    let anchor = if is_docstring(first, &ctx.source) {
        body_node.named_child(1).unwrap_or(first)
    } else {
        first
    };

    let (new_source, line_range) = mutate::insert_before_node(&ctx.source, anchor, attribute_source);
    commit_simple(&ctx, anchor, new_source, line_range)
}

fn is_docstring(node: tree_sitter::Node<'_>, source: &[u8]) -> bool {
    node.kind() == "expression_statement"
        && node
            .named_child(0)
            .map(|c| c.kind() == "string")
            .unwrap_or(false)
        && node.utf8_text(source).is_ok()
}

fn last_named_child(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).filter(|c| c.is_named()).last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn guard_clause_end_to_end() {
        let file = write_fixture("def f(x):\n    return x.value\n");
        let path = file.path().to_string_lossy().to_string();

        let params: Map<String, Value> = serde_json::from_value(json!({
            "condition": "x is None",
            "guard_body": "return None",
            "target": {
                "kind": "function",
                "name": "f",
                "file": path,
                "field": "body"
            }
        }))
        .unwrap();

        let outcome = guard_clause(&params).unwrap();
        assert!(outcome.success, "{:?}", outcome.error);

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            contents,
            "def f(x):\n    if x is None:\n        return None\n    return x.value\n"
        );
    }

    #[test]
    fn change_return_value_end_to_end() {
        let file = write_fixture("def f():\n    return 1\n");
        let path = file.path().to_string_lossy().to_string();

        let params: Map<String, Value> = serde_json::from_value(json!({
            "new_value": "2",
            "target": {
                "kind": "statement",
                "file": path
            }
        }))
        .unwrap();

        let outcome = change_return_value(&params).unwrap();
        assert!(outcome.success, "{:?}", outcome.error);
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("return 2"));
    }
}
