//! Template engine (§4.4): resolves `{{ ns.path }}` expressions embedded in
//! step arguments, and evaluates step `condition` expressions.
//!
//! There are exactly two namespaces: `inputs.<name>` and
//! `steps.<id>.{result | is_error | json.<path>}`. Expressions are
//! restricted to a small character allow-list precisely so a workflow
//! author cannot smuggle shell metacharacters through a template and have
//! a downstream tool (e.g. a shell-executing Tool Caller) interpret them.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use skillforge_types::step_result::StepResult;
use skillforge_types::{Result, SkillforgeError};

/// Maximum length, in characters, of a single `{{ }}` expression body.
pub const MAX_EXPRESSION_LEN: usize = 500;

/// Maximum number of dot-separated segments in a `steps.<id>.json.<path>`
/// lookup.
pub const MAX_JSON_PATH_DEPTH: usize = 10;

/// The template resolution context: the two namespaces an expression may
/// reference. Borrowed rather than owned so the executor can rebuild a
/// fresh context per step without cloning the whole results map.
pub struct Context<'a> {
    pub inputs: &'a BTreeMap<String, Value>,
    pub steps: &'a HashMap<String, StepResult>,
}

/// Resolve every `{{ }}` expression in `value`, recursing depth-first into
/// maps and lists. Non-string leaves pass through unchanged.
pub fn resolve_value(value: &Value, ctx: &Context<'_>) -> Result<Value> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|v| resolve_value(v, ctx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve a step's `args` map against `ctx`.
pub fn resolve_args(
    args: &BTreeMap<String, Value>,
    ctx: &Context<'_>,
) -> Result<BTreeMap<String, Value>> {
    args.iter()
        .map(|(k, v)| Ok((k.clone(), resolve_value(v, ctx)?)))
        .collect()
}

/// Resolve a single string leaf.
///
/// A string that is *exactly* one `{{ expression }}` (no surrounding
/// literal text) returns the expression's resolved value with its native
/// type intact. A string with no expressions is returned unchanged. Any
/// other mix of literal text and expressions resolves every expression,
/// stringifies it with default scalar formatting, and concatenates.
pub fn resolve_string(s: &str, ctx: &Context<'_>) -> Result<Value> {
    let expressions = find_expressions(s)?;
    if expressions.is_empty() {
        return Ok(Value::String(s.to_string()));
    }
    if expressions.len() == 1 && expressions[0].0 == 0 && expressions[0].1 == s.len() {
        return resolve_expression(&expressions[0].2, ctx);
    }

    let mut out = String::new();
    let mut cursor = 0;
    for (start, end, expr) in &expressions {
        out.push_str(&s[cursor..*start]);
        let value = resolve_expression(expr, ctx)?;
        out.push_str(&stringify_scalar(&value));
        cursor = *end;
    }
    out.push_str(&s[cursor..]);
    Ok(Value::String(out))
}

/// Evaluate a step `condition`. Strips an outer `{{ }}` if present, then:
/// if the expression contains `==` or `!=`, resolves the left side and
/// compares it (stringified) against the right side's literal text;
/// otherwise resolves the whole expression and returns its truthiness.
pub fn evaluate_condition(expr: &str, ctx: &Context<'_>) -> Result<bool> {
    let inner = strip_outer_braces(expr);
    validate_expression(inner)?;

    let eq = inner.find("==").map(|p| (p, "==", 2usize));
    let neq = inner.find("!=").map(|p| (p, "!=", 2usize));
    let operator = [eq, neq]
        .into_iter()
        .flatten()
        .min_by_key(|(pos, _, _)| *pos);

    if let Some((pos, op, op_len)) = operator {
        let left = inner[..pos].trim();
        let right = inner[pos + op_len..].trim();
        let left_value = resolve_expression(left, ctx)?;
        let left_str = stringify_scalar(&left_value);
        let equal = left_str == right;
        return Ok(if op == "==" { equal } else { !equal });
    }

    let value = resolve_expression(inner, ctx)?;
    Ok(truthy(&value))
}

/// Truthiness rule (§4.4): booleans are themselves, empty string and zero
/// are false, null is false, everything else is true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn strip_outer_braces(s: &str) -> &str {
    let trimmed = s.trim();
    match trimmed.strip_prefix("{{").and_then(|rest| rest.strip_suffix("}}")) {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Resolve a namespaced expression (`inputs.<name>` or
/// `steps.<id>.{result|is_error|json.<path>}`) to a JSON value.
pub fn resolve_expression(expr: &str, ctx: &Context<'_>) -> Result<Value> {
    validate_expression(expr)?;
    let segments: Vec<&str> = expr.split('.').collect();

    match segments.first().copied() {
        Some("inputs") => {
            if segments.len() != 2 {
                return Err(SkillforgeError::TemplateResolution(format!(
                    "invalid inputs reference '{expr}', expected 'inputs.<name>'"
                )));
            }
            let name = segments[1];
            ctx.inputs.get(name).cloned().ok_or_else(|| {
                SkillforgeError::TemplateResolution(format!("unknown input '{name}'"))
            })
        }
        Some("steps") => {
            if segments.len() < 3 {
                return Err(SkillforgeError::TemplateResolution(format!(
                    "invalid steps reference '{expr}', expected 'steps.<id>.<field>'"
                )));
            }
            let step_id = segments[1];
            let field = segments[2];
            let step = ctx.steps.get(step_id).ok_or_else(|| {
                SkillforgeError::TemplateResolution(format!("unknown step '{step_id}'"))
            })?;
            match field {
                "result" => Ok(Value::String(step.result.clone())),
                "is_error" => Ok(Value::Bool(step.is_error)),
                "json" => {
                    let path = &segments[3..];
                    if path.len() > MAX_JSON_PATH_DEPTH {
                        return Err(SkillforgeError::InvalidExpression(format!(
                            "JSON path depth {} exceeds maximum of {MAX_JSON_PATH_DEPTH}",
                            path.len()
                        )));
                    }
                    let raw = step.raw.as_ref().ok_or_else(|| {
                        SkillforgeError::TemplateResolution(format!(
                            "step '{step_id}' result did not parse as JSON"
                        ))
                    })?;
                    walk_json(raw, path).cloned()
                }
                other => Err(SkillforgeError::TemplateResolution(format!(
                    "unknown step field '{other}', expected 'result', 'is_error', or 'json'"
                ))),
            }
        }
        _ => Err(SkillforgeError::UnknownNamespace(expr.to_string())),
    }
}

fn walk_json<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value> {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(*segment).ok_or_else(|| {
                SkillforgeError::TemplateResolution(format!(
                    "key '{segment}' not found in JSON path"
                ))
            })?,
            Value::Array(items) => {
                let idx: usize = segment.parse().map_err(|_| {
                    SkillforgeError::TemplateResolution(format!(
                        "expected a numeric array index, got '{segment}'"
                    ))
                })?;
                items.get(idx).ok_or_else(|| {
                    SkillforgeError::TemplateResolution(format!(
                        "index {idx} out of bounds (array has {} elements)",
                        items.len()
                    ))
                })?
            }
            _ => {
                return Err(SkillforgeError::TemplateResolution(format!(
                    "cannot traverse into a non-collection value at segment '{segment}'"
                )));
            }
        };
    }
    Ok(current)
}

fn validate_expression(expr: &str) -> Result<()> {
    if expr.chars().count() > MAX_EXPRESSION_LEN {
        return Err(SkillforgeError::InvalidExpression(format!(
            "expression exceeds {MAX_EXPRESSION_LEN}-character cap"
        )));
    }
    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ' | '!' | '=' | '<' | '>')
    };
    if let Some(bad) = expr.chars().find(|c| !allowed(*c)) {
        return Err(SkillforgeError::InvalidExpression(format!(
            "expression contains disallowed character '{bad}'"
        )));
    }
    Ok(())
}

/// Find every `{{ ... }}` occurrence in `s`, returning `(start, end, expr)`
/// byte-range triples where `expr` is the trimmed, already-validated inner
/// text. Errors on an unterminated `{{` or an invalid inner expression.
fn find_expressions(s: &str) -> Result<Vec<(usize, usize, String)>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel_start) = s[cursor..].find("{{") {
        let start = cursor + rel_start;
        let after = start + 2;
        let Some(rel_end) = s[after..].find("}}") else {
            return Err(SkillforgeError::InvalidExpression(format!(
                "unterminated template expression starting at byte {start}"
            )));
        };
        let end = after + rel_end + 2;
        let inner = s[after..after + rel_end].trim();
        validate_expression(inner)?;
        out.push((start, end, inner.to_string()));
        cursor = end;
    }
    Ok(out)
}
