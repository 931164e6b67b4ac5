//! Plan Interpreter - the entry point `verify_plan`/`execute_step` operate
//! through: normalizes a parsed `Plan`, dispatches each `Step` to its tier
//! (surgery primitive, template, fragment, legacy, or composed operator),
//! and reports interference clusters before any file is touched.
//!
//! ARCHITECTURE: one dispatch function per tier, mirroring `Step`'s own
//! shape - no separate "executor" trait hierarchy, since the tiers don't
//! share behavior beyond "produce a `TransactionOutcome`."

use crate::dsl::OperatorRegistry;
use crate::error::{Error, Result};
use crate::fragment::{self, Fragment};
use crate::locator::{self, Locator};
use crate::mutate;
use crate::plan::{FragmentAction, Plan, Step, SurgeryOp};
use crate::transaction::{self, PostEditChecks, TransactionOutcome};
use crate::verify::{pre, VerificationResult};
use codeedit_core::{Graph, Language, Parser};
use serde::Serialize;

/// Result of a full `verify_plan` call: the pre-edit verification result
/// plus the interference clusters the caller should review before running
/// `execute_step` on steps that touch the same files.
#[derive(Debug, Serialize)]
pub struct PlanVerification {
    #[serde(flatten)]
    pub verification: VerificationResult,
    pub interference_groups: Vec<Vec<usize>>,
}

/// Run all pre-edit verification layers against `plan`, against a
/// previously-built `graph` spanning the wider codebase - L6's cross-file
/// impact check needs visibility into importers the plan itself never
/// touches, so the graph is supplied by the caller (typically from an
/// earlier `build_graph` call over the whole project) rather than rebuilt
/// from only the plan's own referenced files.
pub fn verify_plan(plan: &Plan, graph: &Graph) -> PlanVerification {
    let verification = pre::validate_plan(plan, graph);
    let interference_groups = crate::plan::group_by_interference(plan)
        .into_iter()
        .filter(|g| g.len() > 1)
        .collect();

    PlanVerification {
        verification,
        interference_groups,
    }
}

/// Execute a single plan step, dispatching by tier.
pub fn execute_step(step: &Step, plan: &Plan) -> Result<TransactionOutcome> {
    match step {
        Step::Surgery {
            op,
            target,
            source,
            new_name,
            order,
            params,
        } => execute_surgery(*op, target, source.as_ref(), new_name.as_deref(), order.as_deref(), params),
        Step::Template { name, params } => crate::template::apply_template(name, params),
        Step::Fragment {
            fragment,
            target,
            action,
        } => execute_fragment(fragment, target, *action),
        Step::Legacy { op, params } => crate::legacy::apply_legacy(*op, params),
        Step::ComposedCall { op, params } => {
            let registry = OperatorRegistry::new(&plan.define_operators);
            registry.call(op, params)
        }
    }
}

fn load(target: &Locator) -> Result<(std::path::PathBuf, Language, Vec<u8>)> {
    let path = target
        .file()
        .ok_or_else(|| Error::ParamValidation("locator missing file".into()))?
        .to_path_buf();
    let language = Language::from_path(&path)
        .ok_or_else(|| Error::ParamValidation(format!("unsupported language: {}", path.display())))?;
    let source = std::fs::read(&path)?;
    Ok((path, language, source))
}

fn resolve_unique<'a>(
    tree: &'a tree_sitter::Tree,
    source: &[u8],
    language: Language,
    target: &Locator,
) -> Result<tree_sitter::Node<'a>> {
    let matches = locator::resolve(tree, source, language, target)?;
    match matches.len() {
        0 => Err(Error::LocatorMiss("target locator matched no nodes".into())),
        1 => Ok(matches[0]),
        _ => Err(Error::LocatorAmbiguous("target locator matched multiple nodes".into())),
    }
}

/// The default bundle of post-edit checks for a primitive that replaces or
/// inserts text anchored at `node`: C (containment, against the node's
/// pre-edit end byte), R (referential integrity), N (non-triviality), and I
/// (import closure).
fn checks_for(node: tree_sitter::Node<'_>) -> PostEditChecks<'static> {
    PostEditChecks {
        containment_boundary: Some(node.end_byte()),
        run_non_triviality: true,
        run_referential_integrity: true,
        run_import_closure: true,
        ..Default::default()
    }
}

fn execute_surgery(
    op: SurgeryOp,
    target: &Locator,
    source_locator: Option<&Locator>,
    new_name: Option<&str>,
    order: Option<&[i64]>,
    params: &serde_json::Map<String, serde_json::Value>,
) -> Result<TransactionOutcome> {
    let (path, language, source) = load(target)?;
    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&source)?;

    match op {
        SurgeryOp::ReplaceNode => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let replacement = params
                .get("replacement")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::ParamValidation("replace_node missing replacement".into()))?;
            let (new_bytes, line_range) = mutate::replace_node(&source, node, replacement);
            transaction::commit(&path, language, &source, new_bytes, line_range, checks_for(node))
        }
        SurgeryOp::InsertBeforeNode => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let text = params
                .get("text")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::ParamValidation("insert_before_node missing text".into()))?;
            let (new_bytes, line_range) = mutate::insert_before_node(&source, node, text);
            transaction::commit(&path, language, &source, new_bytes, line_range, checks_for(node))
        }
        SurgeryOp::InsertAfterNode => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let text = params
                .get("text")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::ParamValidation("insert_after_node missing text".into()))?;
            let (new_bytes, line_range) = mutate::insert_after_node(&source, node, text);
            transaction::commit(&path, language, &source, new_bytes, line_range, checks_for(node))
        }
        SurgeryOp::Delete => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let boundary = node.end_byte();
            let (new_bytes, line_range) = mutate::delete_node(&source, node);
            transaction::commit(
                &path,
                language,
                &source,
                new_bytes,
                line_range,
                PostEditChecks {
                    containment_boundary: Some(boundary),
                    run_referential_integrity: true,
                    ..Default::default()
                },
            )
        }
        SurgeryOp::WrapNode => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let before = params
                .get("before")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::ParamValidation("wrap_node missing before".into()))?;
            let after = params.get("after").and_then(serde_json::Value::as_str).unwrap_or("");
            let indent_body = params
                .get("indent_body")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            let (new_bytes, line_range) = mutate::wrap_node(&source, node, before, after, indent_body);
            transaction::commit(&path, language, &source, new_bytes, line_range, checks_for(node))
        }
        SurgeryOp::ReplaceAllMatching => {
            let matches = locator::resolve(&tree, &source, language, target)?;
            let replacement = params
                .get("replacement")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::ParamValidation("replace_all_matching missing replacement".into()))?;
            let filter = params
                .get("filter_not_in_string_or_comment")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            let boundary = matches.iter().map(|n| n.end_byte()).max().unwrap_or(0);
            let (new_bytes, line_range) = mutate::replace_all_matching(&source, &matches, replacement, filter)?;
            transaction::commit(
                &path,
                language,
                &source,
                new_bytes,
                line_range,
                PostEditChecks {
                    containment_boundary: Some(boundary),
                    run_non_triviality: true,
                    run_referential_integrity: true,
                    run_import_closure: true,
                    ..Default::default()
                },
            )
        }
        SurgeryOp::Rename => {
            let node = resolve_unique(&tree, &source, language, target)?;
            let name_node = node.child_by_field_name("name").unwrap_or(node);
            let new_name = new_name.ok_or_else(|| Error::ParamValidation("rename missing new_name".into()))?;
            let expected_kind = node.kind();
            let boundary = node.end_byte();
            let (new_bytes, line_range) = mutate::replace_node(&source, name_node, new_name);
            transaction::commit(
                &path,
                language,
                &source,
                new_bytes,
                line_range,
                PostEditChecks {
                    expected_kind: Some(expected_kind),
                    containment_boundary: Some(boundary),
                    run_referential_integrity: true,
                    ..Default::default()
                },
            )
        }
        SurgeryOp::Move | SurgeryOp::Copy | SurgeryOp::Swap => {
            execute_move_copy_swap(op, &path, language, &source, &tree, target, source_locator)
        }
        SurgeryOp::ReorderChildren => execute_reorder(&path, language, &source, &tree, target, order),
    }
}

/// `move`/`copy` relocate a node to just before/after another locator's
/// match; `swap` exchanges the text of two same-file nodes. All three are
/// expressed as two byte splices against the same buffer, largest-offset
/// first, matching the bottom-up invariant `replace_all_matching` uses.
fn execute_move_copy_swap(
    op: SurgeryOp,
    path: &std::path::Path,
    language: Language,
    source: &[u8],
    tree: &tree_sitter::Tree,
    target: &Locator,
    source_locator: Option<&Locator>,
) -> Result<TransactionOutcome> {
    let source_locator = source_locator
        .ok_or_else(|| Error::ParamValidation(format!("{op:?} requires a `source` locator")))?;
    let a = resolve_unique(tree, source, language, target)?;
    let b = resolve_unique(tree, source, language, source_locator)?;
    let boundary = a.end_byte().max(b.end_byte());

    let new_bytes = match op {
        SurgeryOp::Swap => {
            let a_text = a.utf8_text(source).unwrap_or_default().to_string();
            let b_text = b.utf8_text(source).unwrap_or_default().to_string();
            let (first, first_text, second, second_text) = if a.start_byte() <= b.start_byte() {
                (a, a_text, b, b_text)
            } else {
                (b, b_text, a, a_text)
            };
            let step1 = splice_node(source, second, &first_text);
            splice_node(&step1, first, &second_text)
        }
        SurgeryOp::Move => {
            let moved_text = a.utf8_text(source).unwrap_or_default().to_string();
            let (deleted, _) = mutate::delete_node(source, a);
            let reparsed_language = language;
            let mut reparser = Parser::new(reparsed_language)?;
            let reparsed = reparser.parse(&deleted)?;
            let new_target = locator::resolve(&reparsed, &deleted, language, source_locator)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::LocatorMiss("source locator no longer resolves after move".into()))?;
            let (inserted, _) = mutate::insert_after_node(&deleted, new_target, &moved_text);
            inserted
        }
        SurgeryOp::Copy => {
            let copied_text = a.utf8_text(source).unwrap_or_default().to_string();
            let (inserted, _) = mutate::insert_after_node(source, b, &copied_text);
            inserted
        }
        _ => unreachable!(),
    };

    let line_range = mutate::LineRange { start_line: 1, end_line: new_bytes.iter().filter(|&&b| b == b'\n').count().max(1) };
    transaction::commit(
        path,
        language,
        source,
        new_bytes,
        line_range,
        PostEditChecks {
            containment_boundary: Some(boundary),
            run_referential_integrity: true,
            ..Default::default()
        },
    )
}

fn splice_node(source: &[u8], node: tree_sitter::Node<'_>, replacement: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len());
    out.extend_from_slice(&source[..node.start_byte()]);
    out.extend_from_slice(replacement.as_bytes());
    out.extend_from_slice(&source[node.end_byte()..]);
    out
}

/// `reorder_children`: permute `target`'s named, non-comment children
/// according to `order` (a permutation of their current indexes).
fn execute_reorder(
    path: &std::path::Path,
    language: Language,
    source: &[u8],
    tree: &tree_sitter::Tree,
    target: &Locator,
    order: Option<&[i64]>,
) -> Result<TransactionOutcome> {
    let node = resolve_unique(tree, source, language, target)?;
    let order = order.ok_or_else(|| Error::ParamValidation("reorder_children missing order".into()))?;

    let mut cursor = node.walk();
    let children: Vec<tree_sitter::Node<'_>> = node
        .children(&mut cursor)
        .filter(|c| c.is_named() && c.kind() != "comment")
        .collect();

    if order.len() != children.len() {
        return Err(Error::PermutationLengthMismatch {
            given: order.len(),
            expected: children.len(),
        });
    }

    let texts: Vec<&str> = children.iter().map(|c| c.utf8_text(source).unwrap_or_default()).collect();
    let reordered: Vec<&str> = order
        .iter()
        .map(|&i| {
            texts
                .get(i as usize)
                .copied()
                .ok_or_else(|| Error::ParamValidation(format!("reorder index {i} out of range")))
        })
        .collect::<Result<Vec<_>>>()?;

    let separator_start = children.first().map(|c| c.start_byte()).unwrap_or(node.start_byte());
    let separator_end = children.last().map(|c| c.end_byte()).unwrap_or(node.end_byte());
    let joined = reordered.join(", ");

    let mut out = Vec::with_capacity(source.len());
    out.extend_from_slice(&source[..separator_start]);
    out.extend_from_slice(joined.as_bytes());
    out.extend_from_slice(&source[separator_end..]);

    let start_line = source[..separator_start].iter().filter(|&&b| b == b'\n').count() + 1;
    let line_range = mutate::LineRange { start_line, end_line: start_line };
    transaction::commit(
        path,
        language,
        source,
        out,
        line_range,
        PostEditChecks {
            containment_boundary: Some(node.end_byte()),
            ..Default::default()
        },
    )
}

fn execute_fragment(fragment_value: &serde_json::Value, target: &Locator, action: FragmentAction) -> Result<TransactionOutcome> {
    let fragment = Fragment::from_value(fragment_value)?;

    let (path, language, source) = load(target)?;
    let mut parser = Parser::new(language)?;
    let tree = parser.parse(&source)?;
    let node = resolve_unique(&tree, &source, language, target)?;

    let indent_level = leading_indent_level(&source, node);
    let rendered = fragment::serialize(&fragment, indent_level)?;

    let (new_bytes, line_range) = match action {
        FragmentAction::Replace => mutate::replace_node(&source, node, &rendered),
        FragmentAction::InsertBefore => mutate::insert_before_node(&source, node, &rendered),
        FragmentAction::InsertAfter => mutate::insert_after_node(&source, node, &rendered),
    };

    transaction::commit(&path, language, &source, new_bytes, line_range, checks_for(node))
}

fn leading_indent_level(source: &[u8], node: tree_sitter::Node<'_>) -> usize {
    let line_start = source[..node.start_byte()].iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    let prefix = &source[line_start..node.start_byte()];
    prefix.iter().filter(|&&b| b == b' ').count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Plan;
    use std::io::Write;

    #[test]
    fn verify_plan_reports_interference_for_shared_files() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        writeln!(file, "def foo():\n    pass\n").unwrap();
        let path = file.path().to_path_buf();

        let plan_json = serde_json::json!([
            {
                "op": "replace_node",
                "target": {"kind": "function", "name": "foo", "file": path},
                "params": {"replacement": "def foo():\n    return 1"}
            },
            {
                "op": "delete",
                "target": {"kind": "function", "name": "foo", "file": path}
            }
        ]);
        let plan = Plan::from_json(&plan_json).unwrap();
        let graph = codeedit_core::build_graph(&[path]);
        let result = verify_plan(&plan, &graph);
        assert_eq!(result.interference_groups, vec![vec![0, 1]]);
    }
}
