//! Pre-edit verification layers: L0 (syntax), L0a (structural), L1
//! (content), L2 (line drift), L3 (AST context), L4 (symbol occurrences),
//! L5 (preflight syntax), L6 (cross-file impact).
//!
//! These run during `verify_plan`, before any file is touched.

use super::{Finding, VerificationResult};
use crate::locator::{self, Locator};
use crate::plan::{Plan, Step, SurgeryOp};
use codeedit_core::{Graph, Language, Parser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Run all pre-edit layers for `plan` against the previously-built `graph`.
pub fn validate_plan(plan: &Plan, graph: &Graph) -> VerificationResult {
    let mut findings = Vec::new();

    check_l0_syntax(plan, &mut findings);
    check_l0a_structural(plan, graph, &mut findings);
    check_l1_content(plan, graph, &mut findings);
    check_l2_line_drift(plan, &mut findings);
    check_l3_ast_context(plan, &mut findings);
    check_l4_symbol_occurrences(plan, graph, &mut findings);
    check_l5_preflight(plan, &mut findings);
    check_l6_cross_file_impact(plan, graph, &mut findings);

    VerificationResult::from_findings(&findings)
}

fn referenced_files(plan: &Plan) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for group in plan.affected_files() {
        for f in group {
            if !files.contains(&f) {
                files.push(f);
            }
        }
    }
    files
}

fn check_l0_syntax(plan: &Plan, findings: &mut Vec<Finding>) {
    for file in referenced_files(plan) {
        let Some(language) = Language::from_path(&file) else {
            continue;
        };
        let Ok(source) = std::fs::read(&file) else {
            continue;
        };
        let Ok(mut parser) = Parser::new(language) else {
            continue;
        };
        let Ok(tree) = parser.parse(&source) else {
            continue;
        };
        if codeedit_core::has_error_nodes(&tree) {
            findings.push(Finding::error(
                "L0",
                format!("{} does not parse without errors", file.display()),
            ));
        }
    }
}

fn check_l0a_structural(plan: &Plan, _graph: &Graph, findings: &mut Vec<Finding>) {
    for (i, step) in plan.steps.iter().enumerate() {
        match step {
            Step::Surgery { op, target, .. } => match resolve_count(target) {
                Err(e) => findings.push(Finding::error(
                    "L0a",
                    format!("step {i}: locator resolution failed: {e}"),
                )),
                Ok(0) => findings.push(Finding::error(
                    "L0a",
                    format!("step {i}: target locator matched no nodes"),
                )),
                Ok(n) if n > 1 && *op != SurgeryOp::ReplaceAllMatching => {
                    findings.push(Finding::error(
                        "L0a",
                        format!("step {i}: target locator matched {n} nodes ambiguously"),
                    ));
                }
                Ok(_) => {}
            },
            Step::Template { name, params } => {
                if !crate::template::is_known_template(name) {
                    findings.push(Finding::error(
                        "L0a",
                        format!("step {i}: unknown template `{name}`"),
                    ));
                } else if let Some(target) = params.get("target") {
                    if Locator::from_value(target).is_err() {
                        findings.push(Finding::error(
                            "L0a",
                            format!("step {i}: template `{name}` has an invalid target locator"),
                        ));
                    }
                }
            }
            Step::Fragment { target, .. } => {
                if !target.file().map(Path::exists).unwrap_or(false) {
                    findings.push(Finding::error(
                        "L0a",
                        format!("step {i}: fragment target file does not exist"),
                    ));
                }
            }
            Step::Legacy { params, .. } => {
                if params.get("file").and_then(serde_json::Value::as_str).is_none() {
                    findings.push(Finding::error(
                        "L0a",
                        format!("step {i}: legacy op missing required `file` param"),
                    ));
                }
            }
            Step::ComposedCall { op, .. } => {
                if !plan.define_operators.iter().any(|d| &d.name == op) {
                    findings.push(Finding::error(
                        "L0a",
                        format!("step {i}: no composed operator registered named `{op}`"),
                    ));
                }
            }
        }
    }
}

fn resolve_count(target: &Locator) -> Result<usize, String> {
    let file = target.file().ok_or("locator has no file")?;
    let language = Language::from_path(file).ok_or("unsupported language")?;
    let source = std::fs::read(file).map_err(|e| e.to_string())?;
    let mut parser = Parser::new(language).map_err(|e| e.to_string())?;
    let tree = parser.parse(&source).map_err(|e| e.to_string())?;
    let matches = locator::resolve(&tree, &source, language, target).map_err(|e| e.to_string())?;
    Ok(matches.len())
}

fn check_l1_content(plan: &Plan, graph: &Graph, findings: &mut Vec<Finding>) {
    for (i, step) in plan.steps.iter().enumerate() {
        if let Step::Surgery { target, .. } = step {
            if let (Some(name), Some(file)) = (locator_name(target), target.file()) {
                let graph_covers_file = graph.symbols.iter().any(|s| s.file == file)
                    || graph.imports.iter().any(|imp| imp.file == file);
                let exists = graph
                    .symbols
                    .iter()
                    .any(|s| s.name == name && s.file == file);
                if graph_covers_file && !exists {
                    findings.push(Finding::warning(
                        "L1",
                        format!("step {i}: symbol `{name}` not found in the graph for {}", file.display()),
                    ));
                }
            }
        }
    }
}

fn locator_name(locator: &Locator) -> Option<String> {
    match locator {
        Locator::Structured(s) => s.name.clone(),
        Locator::Sexp { .. } => None,
    }
}

fn check_l2_line_drift(plan: &Plan, findings: &mut Vec<Finding>) {
    let mut touches: HashMap<PathBuf, usize> = HashMap::new();
    for group in plan.affected_files() {
        for f in group {
            *touches.entry(f).or_insert(0) += 1;
        }
    }
    for (file, count) in touches {
        if count > 1 {
            findings.push(Finding::warning(
                "L2",
                format!(
                    "{} is touched by {count} steps; later line-indexed operations may observe drifted coordinates",
                    file.display()
                ),
            ));
        }
    }
}

/// L3 - the locator resolves to a node with plausible AST context: not the
/// file's root node (a near-certain sign the locator is too broad to be the
/// intended target), and, for `Rename`, a node shaped like something that can
/// actually be renamed.
fn check_l3_ast_context(plan: &Plan, findings: &mut Vec<Finding>) {
    for (i, step) in plan.steps.iter().enumerate() {
        let Step::Surgery { op, target, .. } = step else {
            continue;
        };
        let Some(file) = target.file() else { continue };
        let Some(language) = Language::from_path(file) else { continue };
        let Ok(source) = std::fs::read(file) else { continue };
        let Ok(mut parser) = Parser::new(language) else { continue };
        let Ok(tree) = parser.parse(&source) else { continue };
        let Ok(matches) = locator::resolve(&tree, &source, language, target) else { continue };
        let Some(node) = matches.first() else { continue };

        if node.id() == tree.root_node().id() {
            findings.push(Finding::error(
                "L3",
                format!("step {i}: target locator resolved to the file's root node"),
            ));
            continue;
        }

        if *op == SurgeryOp::Rename {
            let renameable = node.kind().contains("identifier")
                || node.kind().ends_with("_name")
                || node.child_by_field_name("name").is_some();
            if !renameable {
                findings.push(Finding::warning(
                    "L3",
                    format!(
                        "step {i}: rename target resolved to a `{}` node, not an identifier-shaped one",
                        node.kind()
                    ),
                ));
            }
        }
    }
}

/// L4 - a `Rename` step's `new_name` does not already occur as a symbol in
/// the target file, which would silently shadow or collide after the rename.
fn check_l4_symbol_occurrences(plan: &Plan, graph: &Graph, findings: &mut Vec<Finding>) {
    for (i, step) in plan.steps.iter().enumerate() {
        let Step::Surgery {
            op: SurgeryOp::Rename,
            target,
            new_name: Some(new_name),
            ..
        } = step
        else {
            continue;
        };
        let Some(file) = target.file() else { continue };

        let collisions = graph
            .symbols
            .iter()
            .filter(|s| s.file == file && &s.name == new_name)
            .count();
        if collisions > 0 {
            findings.push(Finding::warning(
                "L4",
                format!(
                    "step {i}: new name `{new_name}` already occurs as a symbol in {}",
                    file.display()
                ),
            ));
        }
    }
}

fn check_l5_preflight(plan: &Plan, findings: &mut Vec<Finding>) {
    for (i, step) in plan.steps.iter().enumerate() {
        let Step::Surgery {
            op: SurgeryOp::ReplaceNode,
            target,
            params,
            ..
        } = step
        else {
            continue;
        };
        let Some(replacement) = params.get("replacement").and_then(serde_json::Value::as_str) else {
            continue;
        };
        let Some(file) = target.file() else { continue };
        let Some(language) = Language::from_path(file) else { continue };
        let Ok(source) = std::fs::read(file) else { continue };
        let Ok(mut parser) = Parser::new(language) else { continue };
        let Ok(tree) = parser.parse(&source) else { continue };
        let Ok(matches) = locator::resolve(&tree, &source, language, target) else { continue };
        let Some(node) = matches.first() else { continue };

        let (simulated, _) = crate::mutate::replace_node(&source, *node, replacement);
        let Ok(mut sim_parser) = Parser::new(language) else { continue };
        let Ok(sim_tree) = sim_parser.parse(&simulated) else { continue };
        if codeedit_core::has_error_nodes(&sim_tree) {
            findings.push(Finding::error(
                "L5",
                format!("step {i}: simulated replacement does not parse"),
            ));
        }
    }
}

fn check_l6_cross_file_impact(plan: &Plan, graph: &Graph, findings: &mut Vec<Finding>) {
    let plan_files: Vec<PathBuf> = referenced_files(plan);

    for (i, step) in plan.steps.iter().enumerate() {
        let Step::Surgery { op, target, new_name, .. } = step else {
            continue;
        };
        if !matches!(op, SurgeryOp::Rename | SurgeryOp::Delete) {
            continue;
        }
        let Some(name) = locator_name(target) else { continue };
        let _ = new_name;

        let importers: Vec<&Path> = graph
            .imports
            .iter()
            .filter(|imp| imp.symbol.as_deref() == Some(name.as_str()))
            .map(|imp| imp.file.as_path())
            .filter(|f| !plan_files.iter().any(|pf| pf == *f))
            .collect();

        for importer in importers {
            findings.push(Finding::warning(
                "L6",
                format!(
                    "step {i}: `{name}` is imported by {} which is outside this plan's file set",
                    importer.display()
                ),
            ));
        }
    }
}
