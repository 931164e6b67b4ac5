//! Legacy text-based operators, kept for backward compatibility only.
//!
//! ARCHITECTURE: a fourth `Step` tier reusing the Tier-1 transactional
//! protocol, implemented with straightforward pattern/line splicing - no
//! new design beyond what is needed so `verify_plan`/`execute_step` never
//! reject a plan that still uses these, per their stated non-core status.

use crate::error::{Error, Result};
use crate::plan::LegacyOp;
use crate::transaction::{self, PostEditChecks, TransactionOutcome};
use codeedit_core::Language;
use serde_json::{Map, Value};

fn get_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ParamValidation(format!("missing required string param `{key}`")))
}

fn get_file(params: &Map<String, Value>) -> Result<std::path::PathBuf> {
    Ok(std::path::PathBuf::from(get_str(params, "file")?))
}

pub fn apply_legacy(op: LegacyOp, params: &Map<String, Value>) -> Result<TransactionOutcome> {
    match op {
        LegacyOp::ReplaceCode => replace_code(params),
        LegacyOp::InsertCode => insert_code(params),
        LegacyOp::DeleteLines => delete_lines(params),
        LegacyOp::RenameSymbol => rename_symbol(params),
        LegacyOp::WrapBlock => wrap_block(params),
        LegacyOp::ReplaceFunctionBody => replace_function_body_legacy(params),
    }
}

fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let longer = a_chars.len().max(b_chars.len());
    if longer == 0 {
        return 1.0;
    }
    let common = a_chars.iter().filter(|c| b_chars.contains(c)).count();
    common as f64 / longer as f64
}

/// Byte offset in `source` just past the end of 1-indexed `line` - used to
/// derive a conservative containment boundary for these line/pattern based
/// ops, which (unlike the tree-sitter primitives) never hold a node to ask.
fn end_of_line_byte(source: &[u8], line: usize) -> usize {
    let mut seen = 0;
    for (i, &b) in source.iter().enumerate() {
        if b == b'\n' {
            seen += 1;
            if seen == line {
                return i + 1;
            }
        }
    }
    source.len()
}

/// Commit with just the containment check, appropriate for ops that neither
/// introduce a new body (N) nor risk cross-file import drift (I): pure
/// deletions and identifier-for-identifier renames.
fn commit_narrow(
    path: &std::path::Path,
    language: Language,
    original: &[u8],
    new_bytes: Vec<u8>,
    line_range: crate::mutate::LineRange,
) -> Result<TransactionOutcome> {
    let boundary = end_of_line_byte(original, line_range.end_line);
    transaction::commit(
        path,
        language,
        original,
        new_bytes,
        line_range,
        PostEditChecks {
            containment_boundary: Some(boundary),
            run_referential_integrity: true,
            ..Default::default()
        },
    )
}

/// Commit with the full C+R+N+I bundle, appropriate for ops that splice in
/// new text: pattern replacement, line insertion, and block wrapping.
fn commit(
    path: &std::path::Path,
    language: Language,
    original: &[u8],
    new_bytes: Vec<u8>,
    line_range: crate::mutate::LineRange,
) -> Result<TransactionOutcome> {
    let boundary = end_of_line_byte(original, line_range.end_line);
    transaction::commit(
        path,
        language,
        original,
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

fn replace_code(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let pattern = get_str(params, "pattern")?;
    let replacement = get_str(params, "replacement")?;
    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&source);

    let Some(byte_offset) = text.find(pattern) else {
        let warning = text
            .lines()
            .map(|line| fuzzy_ratio(line, pattern))
            .fold(0.0_f64, f64::max);
        if warning >= 0.8 {
            return Err(Error::PatternNotFound(format!(
                "pattern not found verbatim; closest line similarity {warning:.2}"
            )));
        }
        return Err(Error::PatternNotFound(format!("pattern not found in {}", file.display())));
    };

    let start_line = source[..byte_offset].iter().filter(|&&b| b == b'\n').count() + 1;
    let new_text = text.replacen(pattern, replacement, 1);
    let line_range = crate::mutate::LineRange {
        start_line,
        end_line: start_line + replacement.matches('\n').count(),
    };
    commit(&file, language, &source, new_text.into_bytes(), line_range)
}

fn insert_code(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let code = get_str(params, "code")?;
    let line = params
        .get("line")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ParamValidation("insert_code requires a 1-indexed line param".into()))?
        as usize;

    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&source);
    let mut lines: Vec<&str> = text.lines().collect();
    let insert_at = line.saturating_sub(1).min(lines.len());

    let mut new_lines: Vec<String> = lines.drain(..insert_at).map(str::to_string).collect();
    new_lines.push(code.to_string());
    new_lines.extend(lines.into_iter().map(str::to_string));

    let new_text = new_lines.join("\n") + "\n";
    let line_range = crate::mutate::LineRange {
        start_line: line,
        end_line: line + code.matches('\n').count(),
    };
    commit(&file, language, &source, new_text.into_bytes(), line_range)
}

fn delete_lines(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let start = params
        .get("start_line")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ParamValidation("delete_lines requires start_line".into()))? as usize;
    let end = params
        .get("end_line")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ParamValidation("delete_lines requires end_line".into()))? as usize;

    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&source);
    let lines: Vec<&str> = text.lines().collect();

    if start == 0 || start > end || end > lines.len() {
        return Err(Error::ParamValidation("delete_lines range out of bounds".into()));
    }

    let mut kept: Vec<&str> = lines[..start - 1].to_vec();
    kept.extend(&lines[end..]);
    let new_text = if kept.is_empty() {
        String::new()
    } else {
        kept.join("\n") + "\n"
    };

    let line_range = crate::mutate::LineRange { start_line: start, end_line: start };
    commit_narrow(&file, language, &source, new_text.into_bytes(), line_range)
}

fn rename_symbol(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let old_name = get_str(params, "old_name")?;
    let new_name = get_str(params, "new_name")?;

    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&source);

    if !text.contains(old_name) {
        return Err(Error::PatternNotFound(format!("symbol `{old_name}` not found in {}", file.display())));
    }

    let boundary = |c: char| !(c.is_alphanumeric() || c == '_');
    let mut result = String::with_capacity(text.len());
    let mut rest = text.as_ref();
    while let Some(idx) = rest.find(old_name) {
        let before_ok = rest[..idx].chars().next_back().map(boundary).unwrap_or(true);
        let after_idx = idx + old_name.len();
        let after_ok = rest[after_idx..].chars().next().map(boundary).unwrap_or(true);
        result.push_str(&rest[..idx]);
        if before_ok && after_ok {
            result.push_str(new_name);
        } else {
            result.push_str(old_name);
        }
        rest = &rest[after_idx..];
    }
    result.push_str(rest);

    let line_range = crate::mutate::LineRange { start_line: 1, end_line: result.matches('\n').count().max(1) };
    commit_narrow(&file, language, &source, result.into_bytes(), line_range)
}

fn wrap_block(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let start = params
        .get("start_line")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ParamValidation("wrap_block requires start_line".into()))? as usize;
    let end = params
        .get("end_line")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ParamValidation("wrap_block requires end_line".into()))? as usize;
    let before = get_str(params, "before")?;
    let after = get_str(params, "after")?;

    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let text = String::from_utf8_lossy(&source);
    let lines: Vec<&str> = text.lines().collect();
    if start == 0 || start > end || end > lines.len() {
        return Err(Error::ParamValidation("wrap_block range out of bounds".into()));
    }

    let mut new_lines: Vec<String> = lines[..start - 1].iter().map(|s| s.to_string()).collect();
    new_lines.push(before.to_string());
    new_lines.extend(lines[start - 1..end].iter().map(|s| s.to_string()));
    new_lines.push(after.to_string());
    new_lines.extend(lines[end..].iter().map(|s| s.to_string()));

    let new_text = new_lines.join("\n") + "\n";
    let line_range = crate::mutate::LineRange { start_line: start, end_line: end + 2 };
    commit(&file, language, &source, new_text.into_bytes(), line_range)
}

fn replace_function_body_legacy(params: &Map<String, Value>) -> Result<TransactionOutcome> {
    let file = get_file(params)?;
    let function_name = get_str(params, "function_name")?;
    let new_body = get_str(params, "new_body")?;

    let language = Language::from_path(&file)
        .ok_or_else(|| Error::ParamValidation("unsupported language".into()))?;
    let source = std::fs::read(&file)?;
    let mut parser = codeedit_core::Parser::new(language)?;
    let tree = parser.parse(&source)?;

    let locator = crate::locator::Locator::Structured(crate::locator::StructuredLocator {
        kind: Some(codeedit_core::NormalizedKind::Function),
        name: Some(function_name.to_string()),
        file: file.clone(),
        parent: None,
        field: Some("body".to_string()),
        nth_child: None,
        index: None,
    });

    let matches = crate::locator::resolve(&tree, &source, language, &locator)?;
    let body_node = match matches.len() {
        0 => return Err(Error::LocatorMiss(format!("function `{function_name}` not found"))),
        1 => matches[0],
        _ => return Err(Error::LocatorAmbiguous(format!("function `{function_name}` ambiguous"))),
    };

    let (new_source, line_range) = crate::mutate::replace_node(&source, body_node, new_body);
    let boundary = body_node.end_byte();
    transaction::commit(
        &file,
        language,
        &source,
        new_source,
        line_range,
        PostEditChecks {
            expected_kind: Some(body_node.kind()),
            containment_boundary: Some(boundary),
            run_non_triviality: true,
            run_referential_integrity: true,
            run_import_closure: true,
        },
    )
}
