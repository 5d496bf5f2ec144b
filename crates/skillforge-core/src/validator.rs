//! Semantic validator (§4.2): checks a [`Skill`] for well-formedness
//! beyond what the codec's types already enforce, producing a pair of
//! `(errors, warnings)`. An empty `errors` list means the skill is
//! acceptable; warnings never block.

use std::collections::HashSet;

use serde_json::Value;
use skillforge_types::skill::{OutputFormat, Skill, WorkflowStep};
use skillforge_types::{name, SkillforgeError};

use crate::planner;
use crate::security;
use crate::suggest::suggestion_suffix;

/// The outcome of validating a [`Skill`]: error and warning messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// `true` iff no error was recorded. Warnings do not affect this.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a [`Skill`] end to end: name, description, body-size
/// warnings, and (when a workflow is declared) step ids, tool namespace
/// syntax, dependency resolution, acyclicity, `onError`/`output`
/// well-formedness, and allowed-tools consistency.
pub fn validate(skill: &Skill) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !name::is_valid(&skill.name) {
        report.errors.push(format!(
            "invalid skill name '{}': must be 1-64 lowercase kebab-case characters \
             with no leading, trailing, or consecutive hyphens",
            skill.name
        ));
    }

    if skill.description.is_empty() {
        report.errors.push("description is required".to_string());
    } else if skill.description.chars().count() > 1024 {
        report.warnings.push(format!(
            "description is {} characters, exceeding the 1024-character guideline",
            skill.description.chars().count()
        ));
    }

    validate_body(skill, &mut report);

    if !skill.workflow.is_empty() {
        validate_workflow(skill, &mut report);
    }

    report
}

fn validate_body(skill: &Skill, report: &mut ValidationReport) {
    let newline_count = skill.body.matches('\n').count();
    if newline_count > 500 {
        report.warnings.push(format!(
            "body has {newline_count} newlines, exceeding the 500-line guideline"
        ));
    }
    let estimated_tokens = skill.body.len() / 4;
    if estimated_tokens > 5000 {
        report.warnings.push(format!(
            "body is approximately {estimated_tokens} tokens, exceeding the 5000-token guideline"
        ));
    }
}

fn validate_workflow(skill: &Skill, report: &mut ValidationReport) {
    let steps = &skill.workflow;
    let all_ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for step in steps {
        if !name::is_valid(&step.id) {
            report
                .errors
                .push(format!("step id '{}' does not match the name grammar", step.id));
        }
        if !seen_ids.insert(step.id.as_str()) {
            report.errors.push(format!("duplicate step id '{}'", step.id));
        }
        if let Err(err) = security::validate_tool_name_namespace(&step.tool) {
            report.errors.push(format!("step '{}': {err}", step.id));
        }
        if let Some(composed) = step.tool.strip_prefix("registry__") {
            report.warnings.push(format!(
                "step '{}': tool 'registry__{composed}' composes another skill; \
                 verify this does not introduce circular composition",
                step.id
            ));
        }
        for dep in &step.depends_on {
            if !all_ids.contains(&dep.as_str()) {
                let suggestion = suggestion_suffix(dep, all_ids.iter().copied());
                report.errors.push(format!(
                    "step '{}': unknown dependsOn reference '{}'{}",
                    step.id, dep, suggestion
                ));
            }
        }
        collect_template_warnings(step, skill, &all_ids, report);
    }

    match planner::plan(steps) {
        Ok(_) => {}
        Err(SkillforgeError::Cycle(msg)) => {
            report
                .errors
                .push(format!("workflow dependency graph contains a cycle: {msg}"));
        }
        Err(SkillforgeError::UnknownStep { reference, suggestion }) => {
            // Already reported per-step above; avoid a duplicate unless the
            // planner caught something the per-step scan didn't (e.g. a
            // reference found only during level grouping).
            let message = format!("unknown step '{reference}'{suggestion}");
            if !report.errors.iter().any(|e| e.contains(&reference)) {
                report.errors.push(message);
            }
        }
        Err(other) => report.errors.push(other.to_string()),
    }

    if let Some(output) = &skill.output {
        if output.format == OutputFormat::Custom
            && output.template.as_deref().unwrap_or("").is_empty()
        {
            report
                .errors
                .push("output format 'custom' requires a non-empty template".to_string());
        }
        for include_id in &output.include {
            if !all_ids.contains(&include_id.as_str()) {
                let suggestion = suggestion_suffix(include_id, all_ids.iter().copied());
                report.errors.push(format!(
                    "output.include references unknown step '{include_id}'{suggestion}"
                ));
            }
        }
    }

    validate_allowed_tools(skill, report);
}

fn validate_allowed_tools(skill: &Skill, report: &mut ValidationReport) {
    if skill.allowed_tools.is_empty() {
        return;
    }
    let stripped: Vec<&str> = skill
        .allowed_tools
        .iter()
        .map(|t| strip_subpattern(t))
        .collect();

    for step in &skill.workflow {
        let server = step.tool.split("__").next().unwrap_or(&step.tool);
        let allowed = stripped
            .iter()
            .any(|&allowed_tool| allowed_tool == step.tool || allowed_tool == server);
        if !allowed {
            report.errors.push(format!(
                "step '{}': tool '{}' is not covered by allowed-tools",
                step.id, step.tool
            ));
        }
    }
}

fn strip_subpattern(tool: &str) -> &str {
    match tool.find('(') {
        Some(idx) => &tool[..idx],
        None => tool,
    }
}

fn collect_template_warnings(
    step: &WorkflowStep,
    skill: &Skill,
    all_ids: &[&str],
    report: &mut ValidationReport,
) {
    let mut expressions = Vec::new();
    for value in step.args.values() {
        collect_value_expressions(value, &mut expressions);
    }
    if let Some(condition) = &step.condition {
        expressions.extend(scan_expressions(condition));
    }

    for expr in expressions {
        let segments: Vec<&str> = expr.split('.').collect();
        match segments.first().copied() {
            Some("inputs") if segments.len() >= 2 => {
                if !skill.inputs.contains_key(segments[1]) {
                    report.warnings.push(format!(
                        "step '{}': template references undeclared input '{}'",
                        step.id, segments[1]
                    ));
                }
            }
            Some("steps") if segments.len() >= 2 => {
                if !all_ids.contains(&segments[1]) {
                    report.warnings.push(format!(
                        "step '{}': template references unknown step '{}'",
                        step.id, segments[1]
                    ));
                }
            }
            _ => {}
        }
    }
}

fn collect_value_expressions(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(scan_expressions(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_value_expressions(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_value_expressions(v, out)),
        _ => {}
    }
}

/// A lenient `{{ ... }}` scanner used only to gather namespace references
/// for warnings; unlike the template engine's resolver, it never errors on
/// disallowed characters since a malformed expression is the template
/// engine's problem to report at execution time, not the validator's.
fn scan_expressions(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel_start) = s[cursor..].find("{{") {
        let start = cursor + rel_start + 2;
        let Some(rel_end) = s[start..].find("}}") else {
            break;
        };
        let end = start + rel_end;
        out.push(s[start..end].trim().to_string());
        cursor = end + 2;
    }
    out
}
