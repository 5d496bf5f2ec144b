//! Workflow executor (§4.6): argument preparation, recursion guarding,
//! level-synchronous parallel scheduling, per-step retry/timeout/error
//! policy enforcement, and output assembly.
//!
//! Rust mapping of the design's concurrency model (grounded in
//! `clawft-core`'s existing async stack): cancellation token =
//! [`tokio_util::sync::CancellationToken`], counting semaphore =
//! [`tokio::sync::Semaphore`], per-call result map mutex =
//! `tokio::sync::Mutex<HashMap<String, StepResult>>`, level fan-out =
//! `tokio::spawn` tasks joined with `futures_util::future::join_all`.
//! Retry/backoff shape is grounded in `stencila-stencila`'s
//! `attractor::retry` module, simplified to the spec's constant-delay
//! policy (no exponential factor or jitter).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex as TokioMutex, Semaphore};

use skillforge_types::skill::{OnError, OutputFormat, Skill, WorkflowStep};
use skillforge_types::step_result::{StepResult, StepStatus};
use skillforge_types::{Result, SkillforgeError};

use crate::planner::{self, Plan};
use crate::security;
use crate::template::{self, Context};
use crate::tool_caller::{CallContext, ContentBlock, ToolCallResult, ToolCaller};

/// Tunables for one [`Executor`]. Configuration is per-instance; the
/// executor holds no mutable state between calls.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Concurrency cap within a single DAG level.
    pub max_parallel: usize,
    /// Byte cap applied to each step's stored result text.
    pub max_result_size: usize,
    /// Deadline for the entire workflow invocation; `None` is unbounded.
    pub workflow_timeout: Option<Duration>,
    /// Maximum composition call-stack depth (`registry__<name>` recursion).
    pub max_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            max_result_size: 1024 * 1024,
            workflow_timeout: None,
            max_depth: 5,
        }
    }
}

/// Drives a single skill's workflow to completion against a [`ToolCaller`].
pub struct Executor {
    tool_caller: Arc<dyn ToolCaller>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(tool_caller: Arc<dyn ToolCaller>) -> Self {
        Self {
            tool_caller,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(tool_caller: Arc<dyn ToolCaller>, config: ExecutorConfig) -> Self {
        Self {
            tool_caller,
            config,
        }
    }

    /// Execute `skill`'s workflow with the supplied `arguments`.
    ///
    /// Invariant failures (missing required input, enum violation, empty
    /// workflow, planner cycle, circular composition, depth exceeded,
    /// cancellation, workflow timeout) return `Err`. Step-level failures
    /// never abort the call; they surface as a non-error `Ok` result whose
    /// `isError` is `true`.
    pub async fn run(
        &self,
        skill: &Skill,
        arguments: Value,
        ctx: &CallContext,
    ) -> Result<ToolCallResult> {
        let _guard = ctx.enter(&skill.name, self.config.max_depth)?;

        if skill.workflow.is_empty() {
            return Err(SkillforgeError::Validation(vec![
                "workflow is empty".to_string(),
            ]));
        }

        let resolved_inputs = prepare_inputs(skill, &arguments)?;
        let plan = planner::plan(&skill.workflow)?;
        let steps_by_id: HashMap<&str, &WorkflowStep> =
            skill.workflow.iter().map(|s| (s.id.as_str(), s)).collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let results: Arc<TokioMutex<HashMap<String, StepResult>>> =
            Arc::new(TokioMutex::new(HashMap::new()));

        let run_future =
            self.run_levels(&plan, &steps_by_id, &resolved_inputs, &semaphore, &results, ctx);

        match self.config.workflow_timeout {
            Some(duration) => match tokio::time::timeout(duration, run_future).await {
                Ok(inner) => inner?,
                Err(_elapsed) => return Err(SkillforgeError::WorkflowTimeout(duration)),
            },
            None => run_future.await?,
        }

        let final_results = results.lock().await;
        assemble_output(skill, &resolved_inputs, &final_results)
    }

    async fn run_levels(
        &self,
        plan: &Plan,
        steps_by_id: &HashMap<&str, &WorkflowStep>,
        resolved_inputs: &BTreeMap<String, Value>,
        semaphore: &Arc<Semaphore>,
        results: &Arc<TokioMutex<HashMap<String, StepResult>>>,
        ctx: &CallContext,
    ) -> Result<()> {
        for (level_idx, level) in plan.levels.iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                return Err(SkillforgeError::Cancelled(
                    "workflow cancelled before level started".to_string(),
                ));
            }

            let snapshot = results.lock().await.clone();
            let context = Context {
                inputs: resolved_inputs,
                steps: &snapshot,
            };

            let mut runnable = Vec::new();
            let mut immediate: Vec<(String, StepResult)> = Vec::new();

            for step_id in level {
                let step = steps_by_id
                    .get(step_id.as_str())
                    .expect("planner only emits declared step ids");

                if let Some(reason) = skip_reason_from_dependencies(step, &snapshot) {
                    immediate.push((step_id.clone(), StepResult::skipped(reason, level_idx)));
                    continue;
                }

                if let Some(expr) = &step.condition {
                    match template::evaluate_condition(expr, &context) {
                        Ok(true) => {}
                        Ok(false) => {
                            immediate.push((
                                step_id.clone(),
                                StepResult::skipped("condition evaluated false", level_idx),
                            ));
                            continue;
                        }
                        Err(err) => {
                            immediate.push((
                                step_id.clone(),
                                finalize_step(
                                    level_idx,
                                    step.on_error,
                                    RawOutcome::Error(err.to_string()),
                                    0,
                                    self.config.max_result_size,
                                    now_ms(),
                                    0,
                                ),
                            ));
                            continue;
                        }
                    }
                }

                let resolved_args = match template::resolve_args(&step.args, &context) {
                    Ok(args) => args,
                    Err(err) => {
                        immediate.push((
                            step_id.clone(),
                            finalize_step(
                                level_idx,
                                step.on_error,
                                RawOutcome::Error(err.to_string()),
                                0,
                                self.config.max_result_size,
                                now_ms(),
                                0,
                            ),
                        ));
                        continue;
                    }
                };

                let timeout_duration = match &step.timeout {
                    Some(raw) => match humantime::parse_duration(raw) {
                        Ok(d) => Some(d),
                        Err(err) => {
                            immediate.push((
                                step_id.clone(),
                                finalize_step(
                                    level_idx,
                                    step.on_error,
                                    RawOutcome::Error(format!(
                                        "invalid timeout '{raw}': {err}"
                                    )),
                                    0,
                                    self.config.max_result_size,
                                    now_ms(),
                                    0,
                                ),
                            ));
                            continue;
                        }
                    },
                    None => None,
                };

                let backoff_duration = match &step.retry {
                    Some(retry) => match humantime::parse_duration(&retry.backoff) {
                        Ok(d) => Some(d),
                        Err(err) => {
                            immediate.push((
                                step_id.clone(),
                                finalize_step(
                                    level_idx,
                                    step.on_error,
                                    RawOutcome::Error(format!(
                                        "invalid backoff '{}': {err}",
                                        retry.backoff
                                    )),
                                    0,
                                    self.config.max_result_size,
                                    now_ms(),
                                    0,
                                ),
                            ));
                            continue;
                        }
                    },
                    None => None,
                };

                let max_attempts = step.retry.as_ref().map_or(1, |r| r.max_attempts.max(1));
                let args_value = serde_json::to_value(&resolved_args).unwrap_or(Value::Null);

                runnable.push((
                    step_id.clone(),
                    step.tool.clone(),
                    args_value,
                    timeout_duration,
                    backoff_duration,
                    max_attempts,
                    step.on_error,
                ));
            }

            {
                let mut guard = results.lock().await;
                for (id, result) in immediate {
                    guard.insert(id, result);
                }
            }

            let mut handles = Vec::with_capacity(runnable.len());
            for (step_id, tool_name, args_value, timeout_duration, backoff_duration, max_attempts, on_error) in
                runnable
            {
                let tool_caller = self.tool_caller.clone();
                let semaphore = semaphore.clone();
                let call_ctx = ctx.clone();
                let max_result_size = self.config.max_result_size;

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let started = now_ms();
                    let start_instant = std::time::Instant::now();
                    let (outcome, attempts) = call_step(
                        &tool_caller,
                        &call_ctx,
                        &tool_name,
                        args_value,
                        timeout_duration,
                        backoff_duration,
                        max_attempts,
                    )
                    .await;
                    let duration_ms = start_instant.elapsed().as_millis() as u64;
                    let result = finalize_step(
                        level_idx,
                        on_error,
                        outcome,
                        attempts,
                        max_result_size,
                        started,
                        duration_ms,
                    );
                    (step_id, result)
                }));
            }

            let finished = futures_util::future::join_all(handles).await;
            let mut guard = results.lock().await;
            for handle in finished {
                if let Ok((step_id, result)) = handle {
                    guard.insert(step_id, result);
                }
            }
        }

        Ok(())
    }
}

/// Classified result of one attempt sequence, before `onError` is applied.
enum RawOutcome {
    Success(ToolCallResult),
    Error(String),
    TimedOut(String),
}

fn skip_reason_from_dependencies(
    step: &WorkflowStep,
    results: &HashMap<String, StepResult>,
) -> Option<String> {
    for dep in &step.depends_on {
        if let Some(dep_result) = results.get(dep) {
            match dep_result.status {
                StepStatus::Skipped => return Some(format!("dependency '{dep}' was skipped")),
                StepStatus::Error | StepStatus::TimedOut => {
                    return Some(format!("dependency '{dep}' failed"));
                }
                _ => {}
            }
        }
    }
    None
}

async fn call_step(
    tool_caller: &Arc<dyn ToolCaller>,
    ctx: &CallContext,
    tool_name: &str,
    args: Value,
    timeout: Option<Duration>,
    backoff: Option<Duration>,
    max_attempts: u32,
) -> (RawOutcome, u32) {
    let mut attempts = 0u32;
    let mut last_error = String::new();

    loop {
        attempts += 1;
        let call_future = tool_caller.call(ctx, tool_name, args.clone());

        let attempt_result = match timeout {
            Some(duration) => match tokio::time::timeout(duration, call_future).await {
                Ok(inner) => inner.map_err(|e| e.to_string()),
                Err(_elapsed) => {
                    return (
                        RawOutcome::TimedOut(format!(
                            "step timed out after {}",
                            humantime::format_duration(duration)
                        )),
                        attempts,
                    );
                }
            },
            None => call_future.await.map_err(|e| e.to_string()),
        };

        match attempt_result {
            Ok(result) => return (RawOutcome::Success(result), attempts),
            Err(message) => {
                last_error = message;
                if attempts < max_attempts {
                    if let Some(delay) = backoff {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
                return (
                    RawOutcome::Error(format!("failed after {attempts} attempts: {last_error}")),
                    attempts,
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finalize_step(
    level: usize,
    on_error: OnError,
    outcome: RawOutcome,
    attempts: u32,
    max_result_size: usize,
    started_at_ms: u64,
    duration_ms: u64,
) -> StepResult {
    let (mut status, text, is_error) = match outcome {
        RawOutcome::Success(result) => (
            if result.is_error {
                StepStatus::Error
            } else {
                StepStatus::Success
            },
            result.text(),
            result.is_error,
        ),
        RawOutcome::Error(message) => (StepStatus::Error, message, true),
        RawOutcome::TimedOut(message) => (StepStatus::TimedOut, message, true),
    };

    let mut skip_reason = None;
    if matches!(status, StepStatus::Error | StepStatus::TimedOut) {
        match on_error {
            OnError::Fail => {}
            OnError::Skip => {
                skip_reason = Some(format!("step failed: {text}"));
                status = StepStatus::Skipped;
            }
            OnError::Continue => {
                status = StepStatus::Success;
            }
        }
    }

    let raw = serde_json::from_str(&text).ok();
    let result = security::truncate_text(&text, max_result_size);

    StepResult {
        result,
        is_error,
        raw,
        status,
        started_at_ms,
        duration_ms,
        attempts,
        skip_reason,
        level,
    }
}

fn prepare_inputs(skill: &Skill, arguments: &Value) -> Result<BTreeMap<String, Value>> {
    let provided = arguments.as_object();
    let mut resolved = BTreeMap::new();

    for (name, def) in &skill.inputs {
        let value = provided.and_then(|m| m.get(name)).cloned();
        let value = match value {
            Some(value) => {
                if !def.enum_values.is_empty() {
                    let actual = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if !def.enum_values.contains(&actual) {
                        return Err(SkillforgeError::InvalidEnum {
                            input: name.clone(),
                            allowed: def.enum_values.clone(),
                            actual,
                        });
                    }
                }
                value
            }
            None => match &def.default {
                Some(default) => default.clone(),
                None => {
                    if def.required {
                        return Err(SkillforgeError::MissingInput(name.clone()));
                    }
                    continue;
                }
            },
        };
        resolved.insert(name.clone(), value);
    }

    Ok(resolved)
}

fn assemble_output(
    skill: &Skill,
    resolved_inputs: &BTreeMap<String, Value>,
    results: &HashMap<String, StepResult>,
) -> Result<ToolCallResult> {
    let output = skill.output.clone().unwrap_or_default();
    let has_failure = results
        .values()
        .any(|r| matches!(r.status, StepStatus::Error | StepStatus::TimedOut));

    let text = match output.format {
        OutputFormat::Merged => {
            let ids: Vec<&str> = if output.include.is_empty() {
                skill.workflow.iter().map(|s| s.id.as_str()).collect()
            } else {
                output.include.iter().map(String::as_str).collect()
            };
            ids.into_iter()
                .filter_map(|id| results.get(id))
                .filter(|r| !matches!(r.status, StepStatus::Skipped))
                .map(|r| r.result.as_str())
                .collect::<Vec<_>>()
                .join("\n---\n")
        }
        OutputFormat::Last => skill
            .workflow
            .iter()
            .rev()
            .filter_map(|s| results.get(&s.id))
            .find(|r| matches!(r.status, StepStatus::Success))
            .map(|r| r.result.clone())
            .unwrap_or_default(),
        OutputFormat::Custom => {
            let Some(template_str) = &output.template else {
                return Err(SkillforgeError::Validation(vec![
                    "output.format is 'custom' but no template was provided".to_string(),
                ]));
            };
            let context = Context {
                inputs: resolved_inputs,
                steps: results,
            };
            match template::resolve_string(template_str, &context)? {
                Value::String(s) => s,
                other => other.to_string(),
            }
        }
    };

    Ok(ToolCallResult {
        content: vec![ContentBlock::text(text)],
        is_error: has_failure,
    })
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
