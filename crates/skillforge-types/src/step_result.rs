//! Per-step and per-workflow execution results.

use serde::{Deserialize, Serialize};

/// Terminal or in-flight state of a single workflow step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// Waiting for its dependencies to complete.
    Pending,
    /// All dependencies satisfied and its condition (if any) is truthy.
    Ready,
    /// Dispatched to the Tool Caller, awaiting a result.
    Running,
    /// Completed normally (including `onError = continue` with `isError`).
    Success,
    /// Completed with `isError` under `onError = fail`, or all retries failed.
    Error,
    /// Never invoked: condition failed, `onError = skip`, or a dependency
    /// was skipped/errored under strict policy.
    Skipped,
    /// The step's `timeout` elapsed before the Tool Caller responded.
    TimedOut,
}

/// The outcome of one workflow step, including execution metadata used for
/// output assembly, diagnostics, and template resolution of later steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Text content returned by the tool, capped at `maxResultSize` bytes.
    pub result: String,

    /// Whether the tool call itself reported an error.
    pub is_error: bool,

    /// Parsed JSON tree of `result`, when it parses as JSON; `None` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,

    /// Current lifecycle status.
    pub status: StepStatus,

    /// Wall-clock time the step began running, as milliseconds since the
    /// Unix epoch (caller-supplied; this crate never reads the system clock
    /// internally to keep resolution deterministic and test-friendly).
    pub started_at_ms: u64,

    /// How long the step ran, in milliseconds.
    pub duration_ms: u64,

    /// Number of Tool Caller invocations made for this step (1 plus retries).
    pub attempts: u32,

    /// Human-readable reason when `status == Skipped`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// The DAG level this step was scheduled in.
    pub level: usize,
}

impl StepResult {
    /// Build a `Skipped` result with the given reason, at the given level.
    pub fn skipped(reason: impl Into<String>, level: usize) -> Self {
        Self {
            result: String::new(),
            is_error: false,
            raw: None,
            status: StepStatus::Skipped,
            started_at_ms: 0,
            duration_ms: 0,
            attempts: 0,
            skip_reason: Some(reason.into()),
            level,
        }
    }
}
