//! Error taxonomy for the skillforge workflow engine.
//!
//! [`SkillforgeError`] is the single error type shared across the codec,
//! validator, planner, template engine, store, and executor. Variants are
//! grouped below by the taxonomy kind they represent (parse, validation,
//! not-found, io, input, planner, template, step, workflow), matching the
//! error-kind vocabulary every component reports against.

use thiserror::Error;

/// Top-level error type for the skillforge workflow engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SkillforgeError {
    // ── parse-error ──────────────────────────────────────────────────

    /// Malformed frontmatter or YAML that the codec could not decode.
    #[error("parse error: {0}")]
    Parse(String),

    /// YAML decode failure bubbled up from `serde_yaml`.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ── validation-error ─────────────────────────────────────────────

    /// Semantic rule violations found by the validator. Always non-empty.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    // ── not-found ─────────────────────────────────────────────────────

    /// The named skill does not exist in the store.
    #[error("skill not found: {0}")]
    SkillNotFound(String),

    /// A requested file does not exist under a skill's directory.
    #[error("file not found: {0}")]
    FileNotFound(String),

    // ── io-error ──────────────────────────────────────────────────────

    /// Underlying filesystem failure, surfaced with its original context.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file path escaped the safe boundary of its skill directory.
    #[error("unsafe path: {0}")]
    UnsafePath(String),

    // ── input-error ───────────────────────────────────────────────────

    /// A required workflow input was not supplied and has no default.
    #[error("missing required input: {0}")]
    MissingInput(String),

    /// A supplied input value is not a member of its declared enum.
    #[error("input '{input}' must be one of {allowed:?}, got {actual}")]
    InvalidEnum {
        /// Name of the offending input.
        input: String,
        /// The values accepted by the input's `enum`.
        allowed: Vec<String>,
        /// The value actually supplied.
        actual: String,
    },

    // ── planner-error ─────────────────────────────────────────────────

    /// The workflow graph contains a cycle.
    #[error("cycle detected: {0}")]
    Cycle(String),

    /// A `dependsOn` or `include` entry names a step id that does not exist.
    #[error("unknown step '{reference}'{suggestion}")]
    UnknownStep {
        /// The dangling reference.
        reference: String,
        /// A "did you mean '...'?" suffix, or empty when no close match exists.
        suggestion: String,
    },

    // ── template-error ────────────────────────────────────────────────

    /// A template expression referenced an unsupported namespace.
    #[error("unknown template namespace: {0}")]
    UnknownNamespace(String),

    /// A template expression could not be resolved against its context.
    #[error("template resolution failed: {0}")]
    TemplateResolution(String),

    /// A template expression violated the character allow-list, length cap,
    /// or JSON-path depth cap.
    #[error("invalid template expression: {0}")]
    InvalidExpression(String),

    // ── step-error ────────────────────────────────────────────────────

    /// A tool call failed, timed out, or returned `isError`.
    #[error("step '{step}' failed: {message}")]
    Step {
        /// Id of the failing step.
        step: String,
        /// Human-readable failure description.
        message: String,
    },

    // ── workflow-error ────────────────────────────────────────────────

    /// Composition recursion exceeded `maxDepth`.
    #[error("max workflow depth exceeded ({0})")]
    MaxDepthExceeded(usize),

    /// A skill transitively invoked itself via `registry__<name>` composition.
    #[error("circular dependency in skill composition: {0}")]
    CircularComposition(String),

    /// The run was cancelled before or during execution.
    #[error("workflow cancelled: {0}")]
    Cancelled(String),

    /// The overall `workflowTimeout` elapsed.
    #[error("workflow timed out after {0:?}")]
    WorkflowTimeout(std::time::Duration),
}

/// Convenience alias used throughout the skillforge crates.
pub type Result<T> = std::result::Result<T, SkillforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = SkillforgeError::Validation(vec!["bad name".into(), "bad tool".into()]);
        assert_eq!(err.to_string(), "validation failed: bad name; bad tool");
    }

    #[test]
    fn missing_input_display() {
        let err = SkillforgeError::MissingInput("repo_url".into());
        assert_eq!(err.to_string(), "missing required input: repo_url");
    }

    #[test]
    fn unknown_step_with_suggestion() {
        let err = SkillforgeError::UnknownStep {
            reference: "fethc".into(),
            suggestion: " (did you mean 'fetch'?)".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown step 'fethc' (did you mean 'fetch'?)"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SkillforgeError = io_err.into();
        assert!(matches!(err, SkillforgeError::Io(_)));
    }

    #[test]
    fn cancelled_message_contains_cancel() {
        let err = SkillforgeError::Cancelled("parent context cancelled".into());
        assert!(err.to_string().contains("cancel"));
    }

    #[test]
    fn result_alias_works() {
        fn ok_fn() -> Result<i32> {
            Ok(1)
        }
        assert_eq!(ok_fn().unwrap(), 1);
    }
}
