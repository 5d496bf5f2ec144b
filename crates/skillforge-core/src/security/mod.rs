//! Security boundary validation shared by the store, codec, and executor.
//!
//! These are the low-level guards the rest of the crate composes: result
//! text truncation (executor §4.6 step 6), YAML nesting depth (also reused
//! by the template engine's JSON-path depth cap, §4.4), directory-name
//! safety (store §4.5's safe-path resolver), file-size limits, and the `__`
//! namespace convention required of `WorkflowStep::tool` (§3).

use skillforge_types::SkillforgeError;

/// Maximum nesting depth for YAML frontmatter and template JSON paths.
pub const MAX_YAML_DEPTH: usize = 10;

/// Maximum file size for SKILL.md files in bytes.
pub const MAX_SKILL_MD_SIZE: usize = 50 * 1024; // 50 KB

/// Truncate a plain text result (the executor's `StepResult.result`) to
/// exactly `max_bytes` bytes, respecting UTF-8 character boundaries.
pub fn truncate_text(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Check that a YAML frontmatter string does not exceed [`MAX_YAML_DEPTH`]
/// levels of nesting. Nesting is detected by indentation changes (each
/// 2-space indent = one level).
pub fn validate_yaml_depth(yaml: &str) -> Result<(), SkillforgeError> {
    let mut max_depth: usize = 0;

    for line in yaml.lines() {
        if line.trim().is_empty() || line.trim().starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let depth = indent.div_ceil(2);
        max_depth = max_depth.max(depth);
    }

    if max_depth > MAX_YAML_DEPTH {
        return Err(SkillforgeError::Parse(format!(
            "YAML frontmatter nesting depth {max_depth} exceeds maximum of {MAX_YAML_DEPTH}"
        )));
    }
    Ok(())
}

/// Validate a directory entry name for use as a skill's on-disk directory.
///
/// Rejects names that contain path traversal (`..`), directory separators
/// (`/` or `\`), or are absolute paths (start with `/`).
pub fn validate_directory_name(name: &str) -> Result<(), SkillforgeError> {
    if name.is_empty() {
        return Err(SkillforgeError::UnsafePath(
            "directory name must not be empty".into(),
        ));
    }
    if name.contains("..") {
        return Err(SkillforgeError::UnsafePath(format!(
            "directory name '{name}' contains path traversal sequence '..'"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(SkillforgeError::UnsafePath(format!(
            "directory name '{name}' contains a directory separator"
        )));
    }
    if name.starts_with('/') {
        return Err(SkillforgeError::UnsafePath(format!(
            "directory name '{name}' is an absolute path"
        )));
    }
    Ok(())
}

/// Validate that a file size is within the allowed limit.
pub fn validate_file_size(
    size: usize,
    max_size: usize,
    file_kind: &str,
) -> Result<(), SkillforgeError> {
    if size > max_size {
        return Err(SkillforgeError::Validation(vec![format!(
            "{file_kind} file size {size} bytes exceeds maximum of {max_size} bytes"
        )]));
    }
    Ok(())
}

/// Validate that a tool name uses the required `{server}__{tool}` format
/// (the literal double-underscore separator required of `WorkflowStep::tool`).
pub fn validate_tool_name_namespace(tool_name: &str) -> Result<(), SkillforgeError> {
    if !tool_name.contains("__") {
        return Err(SkillforgeError::Validation(vec![format!(
            "tool '{tool_name}' does not use the required 'server__tool' namespace format \
             (missing double underscore separator)"
        )]));
    }
    Ok(())
}
