//! DSL / Composition Layer - a minimal expression language for composed
//! operators: primitive calls, conditionals, and calls into other composed
//! operators, with `$variable` substitution against the call's argument map.

use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::mutate;
use crate::plan::ComposedOperatorDef;
use crate::transaction::{self, PostEditChecks, TransactionOutcome};
use codeedit_core::{Language, Parser};
use serde_json::{Map, Value};

/// Registry of composed operators: the caller-supplied `define_operators`
/// plus the built-in catalog (`add_method`, `add_import`, `add_class_attribute`).
pub struct OperatorRegistry<'a> {
    custom: &'a [ComposedOperatorDef],
}

impl<'a> OperatorRegistry<'a> {
    pub fn new(custom: &'a [ComposedOperatorDef]) -> Self {
        Self { custom }
    }

    fn lookup_custom(&self, name: &str) -> Option<&ComposedOperatorDef> {
        self.custom.iter().find(|d| d.name == name)
    }

    /// Execute a call to `op_name` with `call_params`, returning the
    /// outcome of its last step (composed operators are run for effect;
    /// the final step's result represents the call's overall result, the
    /// same convention a single-primitive template uses).
    pub fn call(&self, op_name: &str, call_params: &Map<String, Value>) -> Result<TransactionOutcome> {
        match op_name {
            "add_import" => built_in_add_import(call_params),
            "add_method" => crate::template::apply_template("add_method", call_params),
            "add_class_attribute" => crate::template::apply_template("add_class_attribute", call_params),
            other => {
                let def = self
                    .lookup_custom(other)
                    .ok_or_else(|| Error::UnknownOperator(format!("no composed operator named `{other}`")))?;
                self.run_steps(&def.steps, call_params)
            }
        }
    }

    fn run_steps(&self, steps: &[Value], bindings: &Map<String, Value>) -> Result<TransactionOutcome> {
        let mut bindings = bindings.clone();
        let mut last_outcome: Option<TransactionOutcome> = None;

        for step in steps {
            let outcome = self.run_step(step, &mut bindings)?;
            if let Some(outcome) = outcome {
                if !outcome.success {
                    return Ok(outcome);
                }
                last_outcome = Some(outcome);
            }
        }

        last_outcome.ok_or_else(|| Error::ParamValidation("composed operator had no primitive steps".into()))
    }

    fn run_step(
        &self,
        step: &Value,
        bindings: &mut Map<String, Value>,
    ) -> Result<Option<TransactionOutcome>> {
        let obj = step
            .as_object()
            .ok_or_else(|| Error::ParamValidation("composed step must be an object".into()))?;

        if let Some(expr) = obj.get("if").and_then(Value::as_str) {
            let substituted_expr = substitute_str(expr, bindings);
            let branch = if eval_condition(&substituted_expr) {
                obj.get("then")
            } else {
                obj.get("else")
            };
            return match branch {
                Some(next_step) => self.run_step(next_step, bindings),
                None => Ok(None),
            };
        }

        if let Some(primitive) = obj.get("primitive").and_then(Value::as_str) {
            let raw_params = obj
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let substituted = substitute_map(&raw_params, bindings);
            let outcome = run_primitive(primitive, &substituted)?;

            if let Some(bind_name) = obj.get("bind").and_then(Value::as_str) {
                bindings.insert(bind_name.to_string(), outcome_to_value(&outcome));
            }
            return Ok(Some(outcome));
        }

        if let Some(op_name) = obj.get("op").and_then(Value::as_str) {
            let raw_params = obj
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let substituted = substitute_map(&raw_params, bindings);
            return Ok(Some(self.call(op_name, &substituted)?));
        }

        Err(Error::ParamValidation(
            "composed step must be one of {if}, {primitive}, {op}".into(),
        ))
    }
}

fn outcome_to_value(outcome: &TransactionOutcome) -> Value {
    serde_json::json!({
        "success": outcome.success,
        "line_range": outcome.line_range.map(|r| serde_json::json!({
            "start_line": r.start_line,
            "end_line": r.end_line,
        })),
    })
}

/// Replace every `$name` and `$name.field` occurrence in `text` with the
/// matching binding, recursively substituting into dict/list values when
/// the whole string is exactly one reference (so non-string bindings can be
/// substituted in without being stringified).
fn substitute_str(text: &str, bindings: &Map<String, Value>) -> String {
    if let Some(rest) = text.strip_prefix('$') {
        if let Some((name, field)) = rest.split_once('.') {
            if let Some(Value::Object(obj)) = bindings.get(name) {
                if let Some(value) = obj.get(field) {
                    return value_to_display(value);
                }
            }
        } else if let Some(value) = bindings.get(rest) {
            return value_to_display(value);
        }
    }

    let mut out = String::new();
    let mut rest = text;
    while let Some(dollar_idx) = rest.find('$') {
        out.push_str(&rest[..dollar_idx]);
        let after_dollar = &rest[dollar_idx + 1..];
        let ident_len = after_dollar
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(after_dollar.len());
        let ident = &after_dollar[..ident_len];
        if ident.is_empty() {
            out.push('$');
            rest = after_dollar;
            continue;
        }
        let replacement = match ident.split_once('.') {
            Some((name, field)) => bindings
                .get(name)
                .and_then(|v| v.as_object())
                .and_then(|o| o.get(field))
                .map(value_to_display)
                .unwrap_or_else(|| format!("${ident}")),
            None => bindings.get(ident).map(value_to_display).unwrap_or_else(|| format!("${ident}")),
        };
        out.push_str(&replacement);
        rest = &after_dollar[ident_len..];
    }
    out.push_str(rest);
    out
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn substitute_value(value: &Value, bindings: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, bindings)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, bindings)).collect()),
        Value::Object(obj) => Value::Object(substitute_map(obj, bindings)),
        other => other.clone(),
    }
}

fn substitute_map(map: &Map<String, Value>, bindings: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), substitute_value(v, bindings)))
        .collect()
}

/// Evaluate an `if` expression in a restricted sandbox: no builtins, just
/// truthiness of a literal/substituted value, or a single `==`/`!=` compare.
fn eval_condition(expr: &str) -> bool {
    let expr = expr.trim();

    for op in ["==", "!="] {
        if let Some(idx) = expr.find(op) {
            let lhs = expr[..idx].trim().trim_matches('\'').trim_matches('"');
            let rhs = expr[idx + op.len()..].trim().trim_matches('\'').trim_matches('"');
            return if op == "==" { lhs == rhs } else { lhs != rhs };
        }
    }

    match expr {
        "" | "false" | "False" | "null" | "None" | "0" => false,
        _ => true,
    }
}

fn run_primitive(name: &str, params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let target_value = params
        .get("target")
        .or_else(|| params.get("locator"))
        .ok_or_else(|| Error::ParamValidation(format!("primitive `{name}` missing target/locator")))?;
    let target = Locator::from_value(target_value)?;
    let path = target
        .file()
        .ok_or_else(|| Error::ParamValidation("locator missing file".into()))?
        .to_path_buf();
    let language = Language::from_path(&path)
        .ok_or_else(|| Error::ParamValidation(format!("unsupported language: {}", path.display())))?;
    let source = std::fs::read(&path)?;
    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&source)?;
    let matches = crate::locator::resolve(&tree, &source, language, &target)?;

    match name {
        "replace_node" => {
            let node = matches.into_iter().next().ok_or_else(|| Error::LocatorMiss(name.into()))?;
            let replacement = params
                .get("replacement")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::ParamValidation("replace_node missing replacement".into()))?;
            let (new_source, line_range) = mutate::replace_node(&source, node, replacement);
            transaction::commit(&path, language, &source, new_source, line_range, full_checks(node))
        }
        "insert_before_node" => {
            let node = matches.into_iter().next().ok_or_else(|| Error::LocatorMiss(name.into()))?;
            let text = params
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::ParamValidation("insert_before_node missing text".into()))?;
            let (new_source, line_range) = mutate::insert_before_node(&source, node, text);
            transaction::commit(&path, language, &source, new_source, line_range, full_checks(node))
        }
        "insert_after_node" => {
            let node = matches.into_iter().next().ok_or_else(|| Error::LocatorMiss(name.into()))?;
            let text = params
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::ParamValidation("insert_after_node missing text".into()))?;
            let (new_source, line_range) = mutate::insert_after_node(&source, node, text);
            transaction::commit(&path, language, &source, new_source, line_range, full_checks(node))
        }
        "delete_node" => {
            let node = matches.into_iter().next().ok_or_else(|| Error::LocatorMiss(name.into()))?;
            let boundary = node.end_byte();
            let (new_source, line_range) = mutate::delete_node(&source, node);
            transaction::commit(
                &path,
                language,
                &source,
                new_source,
                line_range,
                PostEditChecks {
                    containment_boundary: Some(boundary),
                    run_referential_integrity: true,
                    ..Default::default()
                },
            )
        }
        other => Err(Error::UnknownOperator(format!("unknown DSL primitive: {other}"))),
    }
}

/// The full C+R+N+I bundle for a primitive that replaces or inserts text
/// anchored at `node`.
fn full_checks(node: tree_sitter::Node<'_>) -> PostEditChecks<'static> {
    PostEditChecks {
        containment_boundary: Some(node.end_byte()),
        run_non_triviality: true,
        run_referential_integrity: true,
        run_import_closure: true,
        ..Default::default()
    }
}

/// `add_import`: insert an import statement at the top of the file unless
/// it is already present verbatim, in which case this is a no-op warning
/// rather than a duplicate insertion (the round-trip idempotence law).
fn built_in_add_import(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = params
        .get("file")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParamValidation("add_import missing file".into()))?;
    let statement = params
        .get("statement")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParamValidation("add_import missing statement".into()))?;

    let path = std::path::PathBuf::from(file);
    let language = Language::from_path(&path)
        .ok_or_else(|| Error::ParamValidation(format!("unsupported language: {}", path.display())))?;
    let source = std::fs::read(&path)?;
    let text = String::from_utf8_lossy(&source);

    if text.lines().any(|line| line.trim() == statement.trim()) {
        return Ok(TransactionOutcome {
            success: true,
            error: None,
            rolled_back: false,
            line_range: None,
            warnings: vec![format!("import `{statement}` already present; no change made")],
        });
    }

    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&source)?;
    let first_child = tree
        .root_node()
        .named_child(0)
        .ok_or_else(|| Error::ParamValidation("target file is empty".into()))?;

    let (new_source, line_range) = mutate::insert_before_node(&source, first_child, statement);
    transaction::commit(&path, language, &source, new_source, line_range, full_checks(first_child))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_plain_variable() {
        let mut bindings = Map::new();
        bindings.insert("name".to_string(), Value::String("foo".to_string()));
        assert_eq!(substitute_str("hello $name!", &bindings), "hello foo!");
    }

    #[test]
    fn substitutes_field_access() {
        let mut bindings = Map::new();
        bindings.insert(
            "result".to_string(),
            serde_json::json!({"line": 5}),
        );
        assert_eq!(substitute_str("line $result.line", &bindings), "line 5");
    }

    #[test]
    fn eval_condition_equality() {
        assert!(eval_condition("a == a"));
        assert!(!eval_condition("a == b"));
        assert!(eval_condition("a != b"));
    }
}
