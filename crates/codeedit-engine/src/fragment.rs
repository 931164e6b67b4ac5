//! Fragment Serializer - validates and renders a tree of typed fragment
//! descriptions to source, with indentation appropriate to the target
//! language.
//!
//! ARCHITECTURE: required-property validation is table-driven (one entry
//! per `FragmentKind`), the same per-kind dispatch idiom the Language
//! Registry uses for node-type tables. Rendering is Python-only for now:
//! indent-sensitive languages share one rendering path, brace-delimited
//! languages would need a different set of rendering rules and are out of
//! scope of the current catalog.

use crate::error::{Error, Result};
use serde_json::Value;

const INDENT_UNIT: &str = "    ";

/// The ~15 structured fragment kinds supported by the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    FunctionDefinition,
    ClassDefinition,
    IfStatement,
    ElifClause,
    ElseClause,
    ForStatement,
    WhileStatement,
    WithStatement,
    TryStatement,
    ExceptClause,
    FinallyClause,
    ReturnStatement,
    RaiseStatement,
    Assignment,
    ExpressionStatement,
}

impl FragmentKind {
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "function_definition" => Self::FunctionDefinition,
            "class_definition" => Self::ClassDefinition,
            "if_statement" => Self::IfStatement,
            "elif_clause" => Self::ElifClause,
            "else_clause" => Self::ElseClause,
            "for_statement" => Self::ForStatement,
            "while_statement" => Self::WhileStatement,
            "with_statement" => Self::WithStatement,
            "try_statement" => Self::TryStatement,
            "except_clause" => Self::ExceptClause,
            "finally_clause" => Self::FinallyClause,
            "return_statement" => Self::ReturnStatement,
            "raise_statement" => Self::RaiseStatement,
            "assignment" => Self::Assignment,
            "expression_statement" => Self::ExpressionStatement,
            other => {
                return Err(Error::ParamValidation(format!("unknown fragment kind: {other}")))
            }
        })
    }

    /// Properties required to be present (as non-null) on a fragment of
    /// this kind, beyond `kind` and `children`.
    fn required_properties(self) -> &'static [&'static str] {
        match self {
            Self::FunctionDefinition => &["name", "params"],
            Self::ClassDefinition => &["name"],
            Self::IfStatement => &["condition"],
            Self::ElifClause => &["condition"],
            Self::ElseClause => &[],
            Self::ForStatement => &["target", "iterable"],
            Self::WhileStatement => &["condition"],
            Self::WithStatement => &["context_expr"],
            Self::TryStatement => &[],
            Self::ExceptClause => &[],
            Self::FinallyClause => &[],
            Self::ReturnStatement => &[],
            Self::RaiseStatement => &[],
            Self::Assignment => &["target", "value"],
            Self::ExpressionStatement => &["expression"],
        }
    }

    /// Leaf kinds forbid children entirely.
    fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::ReturnStatement | Self::RaiseStatement | Self::Assignment | Self::ExpressionStatement
        )
    }
}

/// A parsed, not-yet-rendered fragment node.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub properties: serde_json::Map<String, Value>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ParamValidation("fragment must be an object".into()))?;
        let kind_str = obj
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ParamValidation("fragment missing kind".into()))?;
        let kind = FragmentKind::from_str(kind_str)?;

        let children = match obj.get("children") {
            Some(Value::Array(items)) => items
                .iter()
                .map(Fragment::from_value)
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(Error::ParamValidation("fragment children must be an array".into()))
            }
        };

        let mut properties = obj.clone();
        properties.remove("kind");
        properties.remove("children");

        Ok(Fragment {
            kind,
            properties,
            children,
        })
    }

    /// Recursively validate required properties and the leaf-kind
    /// children ban.
    pub fn validate(&self) -> Result<()> {
        for prop in self.kind.required_properties() {
            if !self.properties.contains_key(*prop) || self.properties[*prop].is_null() {
                return Err(Error::ParamValidation(format!(
                    "fragment of kind {:?} missing required property `{prop}`",
                    self.kind
                )));
            }
        }
        if self.kind.is_leaf() && !self.children.is_empty() {
            return Err(Error::ParamValidation(format!(
                "fragment of kind {:?} is a leaf kind and cannot have children",
                self.kind
            )));
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }

    fn prop_str(&self, key: &str) -> &str {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn indent(level: usize) -> String {
    INDENT_UNIT.repeat(level)
}

fn render_body(children: &[Fragment], level: usize) -> String {
    if children.is_empty() {
        return format!("{}pass", indent(level));
    }
    children
        .iter()
        .map(|c| render(c, level))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a validated fragment tree to source at the given base indent
/// level (0 = column 0).
pub fn serialize(fragment: &Fragment, indent_level: usize) -> Result<String> {
    fragment.validate()?;
    Ok(render(fragment, indent_level))
}

fn render(fragment: &Fragment, level: usize) -> String {
    let pad = indent(level);
    match fragment.kind {
        FragmentKind::FunctionDefinition => {
            let name = fragment.prop_str("name");
            let params = fragment.prop_str("params");
            format!(
                "{pad}def {name}({params}):\n{}",
                render_body(&fragment.children, level + 1)
            )
        }
        FragmentKind::ClassDefinition => {
            let name = fragment.prop_str("name");
            let bases = fragment.prop_str("bases");
            let header = if bases.is_empty() {
                format!("{pad}class {name}:")
            } else {
                format!("{pad}class {name}({bases}):")
            };
            format!("{header}\n{}", render_body(&fragment.children, level + 1))
        }
        FragmentKind::IfStatement => {
            let condition = fragment.prop_str("condition");
            let (body, rest): (Vec<_>, Vec<_>) = fragment
                .children
                .iter()
                .partition(|c| !matches!(c.kind, FragmentKind::ElifClause | FragmentKind::ElseClause));
            let mut out = format!(
                "{pad}if {condition}:\n{}",
                render_body(&body.into_iter().cloned().collect::<Vec<_>>(), level + 1)
            );
            for clause in rest {
                out.push('\n');
                out.push_str(&render(clause, level));
            }
            out
        }
        FragmentKind::ElifClause => {
            let condition = fragment.prop_str("condition");
            format!(
                "{pad}elif {condition}:\n{}",
                render_body(&fragment.children, level + 1)
            )
        }
        FragmentKind::ElseClause => {
            format!("{pad}else:\n{}", render_body(&fragment.children, level + 1))
        }
        FragmentKind::ForStatement => {
            let target = fragment.prop_str("target");
            let iterable = fragment.prop_str("iterable");
            format!(
                "{pad}for {target} in {iterable}:\n{}",
                render_body(&fragment.children, level + 1)
            )
        }
        FragmentKind::WhileStatement => {
            let condition = fragment.prop_str("condition");
            format!(
                "{pad}while {condition}:\n{}",
                render_body(&fragment.children, level + 1)
            )
        }
        FragmentKind::WithStatement => {
            let context_expr = fragment.prop_str("context_expr");
            let as_name = fragment.prop_str("as_name");
            let header = if as_name.is_empty() {
                format!("{pad}with {context_expr}:")
            } else {
                format!("{pad}with {context_expr} as {as_name}:")
            };
            format!("{header}\n{}", render_body(&fragment.children, level + 1))
        }
        FragmentKind::TryStatement => {
            let mut body = Vec::new();
            let mut excepts = Vec::new();
            let mut else_clause = None;
            let mut finally_clause = None;
            for child in &fragment.children {
                match child.kind {
                    FragmentKind::ExceptClause => excepts.push(child),
                    FragmentKind::ElseClause => else_clause = Some(child),
                    FragmentKind::FinallyClause => finally_clause = Some(child),
                    _ => body.push(child.clone()),
                }
            }
            let mut out = format!("{pad}try:\n{}", render_body(&body, level + 1));
            for exc in excepts {
                out.push('\n');
                out.push_str(&render(exc, level));
            }
            if let Some(clause) = else_clause {
                out.push('\n');
                out.push_str(&render(clause, level));
            }
            if let Some(clause) = finally_clause {
                out.push('\n');
                out.push_str(&render(clause, level));
            }
            out
        }
        FragmentKind::ExceptClause => {
            let exc_type = fragment.prop_str("exception_type");
            let as_name = fragment.prop_str("as_name");
            let header = match (exc_type.is_empty(), as_name.is_empty()) {
                (true, _) => format!("{pad}except:"),
                (false, true) => format!("{pad}except {exc_type}:"),
                (false, false) => format!("{pad}except {exc_type} as {as_name}:"),
            };
            format!("{header}\n{}", render_body(&fragment.children, level + 1))
        }
        FragmentKind::FinallyClause => {
            format!("{pad}finally:\n{}", render_body(&fragment.children, level + 1))
        }
        FragmentKind::ReturnStatement => {
            let value = fragment.prop_str("value");
            if value.is_empty() {
                format!("{pad}return")
            } else {
                format!("{pad}return {value}")
            }
        }
        FragmentKind::RaiseStatement => {
            let exception = fragment.prop_str("exception");
            if exception.is_empty() {
                format!("{pad}raise")
            } else {
                format!("{pad}raise {exception}")
            }
        }
        FragmentKind::Assignment => {
            let target = fragment.prop_str("target");
            let value = fragment.prop_str("value");
            format!("{pad}{target} = {value}")
        }
        FragmentKind::ExpressionStatement => {
            format!("{pad}{}", fragment.prop_str("expression"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_if_statement_with_single_return() {
        let value = json!({
            "kind": "if_statement",
            "condition": "x > 0",
            "children": [
                {"kind": "return_statement", "value": "x"}
            ]
        });
        let fragment = Fragment::from_value(&value).unwrap();
        let rendered = serialize(&fragment, 0).unwrap();
        assert_eq!(rendered, "if x > 0:\n    return x");
    }

    #[test]
    fn empty_children_render_pass() {
        let value = json!({"kind": "else_clause", "children": []});
        let fragment = Fragment::from_value(&value).unwrap();
        let rendered = serialize(&fragment, 0).unwrap();
        assert_eq!(rendered, "else:\n    pass");
    }

    #[test]
    fn leaf_kind_rejects_children() {
        let value = json!({
            "kind": "return_statement",
            "value": "1",
            "children": [{"kind": "expression_statement", "expression": "2"}]
        });
        let fragment = Fragment::from_value(&value).unwrap();
        assert!(fragment.validate().is_err());
    }

    #[test]
    fn missing_required_property_errors() {
        let value = json!({"kind": "assignment", "target": "x"});
        let fragment = Fragment::from_value(&value).unwrap();
        assert!(fragment.validate().is_err());
    }

    #[test]
    fn try_statement_partitions_clauses() {
        let value = json!({
            "kind": "try_statement",
            "children": [
                {"kind": "expression_statement", "expression": "risky()"},
                {"kind": "except_clause", "exception_type": "ValueError", "children": [
                    {"kind": "return_statement", "value": "None"}
                ]},
                {"kind": "finally_clause", "children": [
                    {"kind": "expression_statement", "expression": "cleanup()"}
                ]}
            ]
        });
        let fragment = Fragment::from_value(&value).unwrap();
        let rendered = serialize(&fragment, 0).unwrap();
        assert_eq!(
            rendered,
            "try:\n    risky()\nexcept ValueError:\n    return None\nfinally:\n    cleanup()"
        );
    }
}
