//! Plan data model - the JSON edit plan, tagged by tier.
//!
//! ARCHITECTURE: static dispatch by tag, not a dynamic dispatch table: the
//! three-tier step discrimination the source expresses as dynamic key
//! lookup becomes one Rust enum here, matching the design note's guidance
//! to replace "dynamic dispatch in the source" with "static dispatch by tag."

use crate::error::{Error, Result};
use crate::locator::Locator;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// AST surgery operations (tier 1), named by the `op` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurgeryOp {
    Move,
    Copy,
    Swap,
    Rename,
    Delete,
    ReorderChildren,
    ReplaceNode,
    InsertBeforeNode,
    InsertAfterNode,
    WrapNode,
    ReplaceAllMatching,
}

impl SurgeryOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "move" => Self::Move,
            "copy" => Self::Copy,
            "swap" => Self::Swap,
            "rename" => Self::Rename,
            "delete" | "delete_node" => Self::Delete,
            "reorder_children" => Self::ReorderChildren,
            "replace_node" => Self::ReplaceNode,
            "insert_before_node" => Self::InsertBeforeNode,
            "insert_after_node" => Self::InsertAfterNode,
            "wrap_node" => Self::WrapNode,
            "replace_all_matching" => Self::ReplaceAllMatching,
            _ => return None,
        })
    }
}

/// Legacy text-based operators, kept for backward compatibility only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyOp {
    ReplaceCode,
    InsertCode,
    DeleteLines,
    RenameSymbol,
    WrapBlock,
    ReplaceFunctionBody,
}

impl LegacyOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "replace_code" => Self::ReplaceCode,
            "insert_code" => Self::InsertCode,
            "delete_lines" => Self::DeleteLines,
            "rename_symbol" => Self::RenameSymbol,
            "wrap_block" => Self::WrapBlock,
            "replace_function_body" => Self::ReplaceFunctionBody,
            _ => return None,
        })
    }
}

/// The "insert before/after/replace" placement for a fragment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentAction {
    Replace,
    InsertBefore,
    InsertAfter,
}

/// One step of an edit plan, tagged by tier. Discriminated by key presence,
/// precedence `op(surgery) > template > fragment > op(legacy)`.
#[derive(Debug, Clone)]
pub enum Step {
    Surgery {
        op: SurgeryOp,
        target: Locator,
        source: Option<Locator>,
        new_name: Option<String>,
        order: Option<Vec<i64>>,
        params: Map<String, Value>,
    },
    Template {
        name: String,
        params: Map<String, Value>,
    },
    Fragment {
        fragment: Value,
        target: Locator,
        action: FragmentAction,
    },
    Legacy {
        op: LegacyOp,
        params: Map<String, Value>,
    },
    /// A call into a custom composed operator registered via `define_operators`.
    ComposedCall {
        op: String,
        params: Map<String, Value>,
    },
}

/// A custom composed operator definition from `define_operators`.
#[derive(Debug, Clone)]
pub struct ComposedOperatorDef {
    pub name: String,
    pub steps: Vec<Value>,
}

/// A normalized plan: `{define_operators: [...], plan: [...]}`.
#[derive(Debug, Clone)]
pub struct Plan {
    pub define_operators: Vec<ComposedOperatorDef>,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Parse a plan from either JSON shape: a bare array, or
    /// `{define_operators, plan}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let (operators_value, steps_value) = match value {
            Value::Array(_) => (None, value),
            Value::Object(map) => (map.get("define_operators"), map.get("plan").unwrap_or(value)),
            _ => {
                return Err(Error::ParamValidation(
                    "plan JSON must be an array or an object".into(),
                ))
            }
        };

        let define_operators = match operators_value {
            Some(Value::Array(items)) => items
                .iter()
                .map(parse_composed_operator_def)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let steps_array = steps_value
            .as_array()
            .ok_or_else(|| Error::ParamValidation("plan must be an array of steps".into()))?;

        let steps = steps_array
            .iter()
            .map(Step::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Plan {
            define_operators,
            steps,
        })
    }

    /// The set of files each step touches, by step index, used for
    /// interference detection in the interpreter.
    pub fn affected_files(&self) -> Vec<Vec<PathBuf>> {
        self.steps.iter().map(step_affected_files).collect()
    }
}

fn parse_composed_operator_def(value: &Value) -> Result<ComposedOperatorDef> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::ParamValidation("define_operators entry must be an object".into()))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParamValidation("composed operator missing name".into()))?
        .to_string();
    let steps = obj
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::ParamValidation("composed operator missing steps".into()))?
        .clone();
    Ok(ComposedOperatorDef { name, steps })
}

impl Step {
    /// Parse one step, applying key-presence precedence:
    /// `op(surgery) > template > fragment > op(legacy/composed)`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ParamValidation("step must be a JSON object".into()))?;

        if let Some(op_name) = obj.get("op").and_then(Value::as_str) {
            if let Some(op) = SurgeryOp::from_name(op_name) {
                let target = obj
                    .get("target")
                    .ok_or_else(|| Error::ParamValidation("surgery step missing target".into()))
                    .and_then(Locator::from_value)?;
                let source = obj.get("source").map(Locator::from_value).transpose()?;
                let new_name = obj
                    .get("new_name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let order = obj.get("order").and_then(Value::as_array).map(|arr| {
                    arr.iter().filter_map(Value::as_i64).collect::<Vec<_>>()
                });
                let params = obj
                    .get("params")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                return Ok(Step::Surgery {
                    op,
                    target,
                    source,
                    new_name,
                    order,
                    params,
                });
            }
        }

        if let Some(name) = obj.get("template").and_then(Value::as_str) {
            let params = obj
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            return Ok(Step::Template {
                name: name.to_string(),
                params,
            });
        }

        if let Some(fragment) = obj.get("fragment") {
            let target = obj
                .get("target")
                .ok_or_else(|| Error::ParamValidation("fragment step missing target".into()))
                .and_then(Locator::from_value)?;
            let action = match obj.get("action").and_then(Value::as_str) {
                Some("insert_before") => FragmentAction::InsertBefore,
                Some("insert_after") => FragmentAction::InsertAfter,
                Some("replace") | None => FragmentAction::Replace,
                Some(other) => {
                    return Err(Error::ParamValidation(format!(
                        "unknown fragment action: {other}"
                    )))
                }
            };
            return Ok(Step::Fragment {
                fragment: fragment.clone(),
                target,
                action,
            });
        }

        if let Some(op_name) = obj.get("op").and_then(Value::as_str) {
            let params = obj
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(op) = LegacyOp::from_name(op_name) {
                return Ok(Step::Legacy { op, params });
            }
            return Ok(Step::ComposedCall {
                op: op_name.to_string(),
                params,
            });
        }

        Err(Error::ParamValidation(
            "step does not match any known tier (op/template/fragment)".into(),
        ))
    }
}

/// The file(s) a step reads from or writes to, for interference grouping.
pub fn step_affected_files(step: &Step) -> Vec<PathBuf> {
    let mut files = Vec::new();
    match step {
        Step::Surgery { target, source, .. } => {
            if let Some(f) = target.file() {
                files.push(f.to_path_buf());
            }
            if let Some(s) = source {
                if let Some(f) = s.file() {
                    files.push(f.to_path_buf());
                }
            }
        }
        Step::Template { params, .. } => {
            if let Some(target) = params.get("target") {
                if let Ok(locator) = Locator::from_value(target) {
                    if let Some(f) = locator.file() {
                        files.push(f.to_path_buf());
                    }
                }
            }
        }
        Step::Fragment { target, .. } => {
            if let Some(f) = target.file() {
                files.push(f.to_path_buf());
            }
        }
        Step::Legacy { params, .. } | Step::ComposedCall { params, .. } => {
            if let Some(file) = params.get("file").and_then(Value::as_str) {
                files.push(PathBuf::from(file));
            }
        }
    }
    files
}

/// Group step indexes into interference clusters by transitive file-set
/// overlap - two steps in the same cluster touch at least one common file,
/// directly or through a chain of shared files.
pub fn group_by_interference(plan: &Plan) -> Vec<Vec<usize>> {
    let affected = plan.affected_files();
    let mut parent: Vec<usize> = (0..affected.len()).collect();

    fn find(parent: &mut [usize], i: usize) -> usize {
        if parent[i] != i {
            parent[i] = find(parent, parent[i]);
        }
        parent[i]
    }

    fn union(parent: &mut [usize], a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }

    for i in 0..affected.len() {
        for j in (i + 1)..affected.len() {
            if affected[i].iter().any(|f| affected[j].contains(f)) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..affected.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    groups.into_values().collect()
}
