//! Registry façade (§6): the seam between a host (MCP server, CLI,
//! in-process caller) and the skill [`crate::store::Store`] plus
//! [`crate::executor::Executor`].
//!
//! Mirrors the shape of the teacher's `clawft-core::agent::skills_v2`
//! registry -- `Initialize`/`Refresh`/`Tools`/`CallTool` -- generalized
//! to the spec's `ListPromptData`/`GetPromptData` surface for hosts that
//! consume skill bodies as documents rather than invoking them as tools.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use skillforge_types::skill::{InputType, Skill, SkillState};
use skillforge_types::{Result, SkillforgeError};

use crate::executor::{Executor, ExecutorConfig};
use crate::store::Store;
use crate::tool_caller::{CallContext, ToolCallResult, ToolCaller};

/// One entry in [`Registry::tools`]'s result: the shape a host expects
/// when listing callable tools (MCP `tools/list`, or a CLI `tools` table).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One entry in [`Registry::list_prompt_data`]'s result: a skill surfaced
/// as a document rather than a callable tool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
}

/// A skill's body plus its frontmatter metadata, for hosts that want the
/// full document rather than just its tool-call shape.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct PromptData {
    pub name: String,
    pub description: String,
    pub body: String,
}

/// The registry façade: owns a [`Store`] and an [`Executor`], and exposes
/// active, executable skills as callable tools.
///
/// `name()` is a fixed identifier a host can use to namespace this
/// registry's tools (`registry__<skill>`, per §8's composition rule).
pub struct Registry {
    store: Arc<Store>,
    executor: Executor,
}

impl Registry {
    /// Build a registry over `root`, calling out to `tool_caller` for
    /// every step of every skill's workflow.
    pub fn new(root: impl Into<std::path::PathBuf>, tool_caller: Arc<dyn ToolCaller>) -> Self {
        Self {
            store: Arc::new(Store::new(root)),
            executor: Executor::new(tool_caller),
        }
    }

    /// Build a registry with a non-default [`ExecutorConfig`] (concurrency
    /// cap, result size cap, workflow timeout, recursion depth).
    pub fn with_config(
        root: impl Into<std::path::PathBuf>,
        tool_caller: Arc<dyn ToolCaller>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store: Arc::new(Store::new(root)),
            executor: Executor::with_config(tool_caller, config),
        }
    }

    /// The registry's own namespace, for hosts that prefix tool names
    /// with their source (`registry__<skill>`).
    pub fn name(&self) -> &'static str {
        "registry"
    }

    /// Load every skill from disk. Must be called before [`Registry::tools`]
    /// or [`Registry::call_tool`] return anything.
    pub async fn initialize(&self) -> Result<()> {
        info!("registry initializing");
        self.store.load().await
    }

    /// Re-read the store from disk, picking up additions, edits, and
    /// deletions made since the last load or refresh.
    pub async fn refresh(&self) -> Result<()> {
        debug!("registry refreshing");
        self.store.load().await
    }

    /// Active, executable skills as callable tools, each with a
    /// JSON-Schema `inputSchema` generated from its declared inputs.
    ///
    /// Draft and disabled skills, and skills with no workflow, are
    /// omitted -- only a skill a host could actually invoke is listed.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.store
            .list()
            .await
            .into_iter()
            .filter(|skill| skill.state == SkillState::Active && skill.is_executable())
            .map(|skill| ToolDescriptor {
                name: skill.name.clone(),
                description: skill.description.clone(),
                input_schema: input_schema(&skill),
            })
            .collect()
    }

    /// Execute the named skill's workflow with `arguments`.
    ///
    /// Returns `Err` for invariant failures (unknown skill, disabled/draft
    /// state, missing required input, cycle, recursion depth exceeded,
    /// cancellation/timeout); step-level failures surface as a non-error
    /// `Ok` result whose `isError` is `true`, per §4.6.
    pub async fn call_tool(
        &self,
        ctx: &CallContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult> {
        let skill = self.store.get(name).await?;

        if skill.state != SkillState::Active {
            return Err(SkillforgeError::Validation(vec![format!(
                "skill '{name}' is not active (state = {:?})",
                skill.state
            )]));
        }
        if !skill.is_executable() {
            return Err(SkillforgeError::Validation(vec![format!(
                "skill '{name}' has no workflow"
            )]));
        }

        debug!(skill = %name, "calling tool via registry");
        self.executor.run(&skill, arguments, ctx).await
    }

    /// Convenience wrapper over [`Registry::call_tool`] that builds a
    /// fresh, non-cancelled [`CallContext`].
    pub async fn call_tool_fresh(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let ctx = CallContext::new(CancellationToken::new());
        self.call_tool(&ctx, name, arguments).await
    }

    /// Active skills as prompt-style documents: name plus description,
    /// for hosts that list documents rather than tools.
    pub async fn list_prompt_data(&self) -> Vec<PromptDescriptor> {
        self.store
            .list()
            .await
            .into_iter()
            .filter(|skill| skill.state == SkillState::Active)
            .map(|skill| PromptDescriptor {
                name: skill.name.clone(),
                description: skill.description.clone(),
            })
            .collect()
    }

    /// The full body of one skill, for a host that wants the document
    /// rather than to invoke it.
    pub async fn get_prompt_data(&self, name: &str) -> Result<PromptData> {
        let skill = self.store.get(name).await?;
        Ok(PromptData {
            name: skill.name,
            description: skill.description,
            body: skill.body,
        })
    }

    /// The underlying store, for hosts that need CRUD access beyond the
    /// tool-facing surface (the CLI's skill management commands).
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Build a JSON-Schema `object` schema from a skill's declared inputs.
fn input_schema(skill: &Skill) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (input_name, input) in &skill.inputs {
        let mut property = serde_json::Map::new();
        property.insert("type".to_string(), json!(json_schema_type(input.input_type)));
        if !input.description.is_empty() {
            property.insert("description".to_string(), json!(input.description));
        }
        if !input.enum_values.is_empty() {
            property.insert("enum".to_string(), json!(input.enum_values));
        }
        if let Some(default) = &input.default {
            property.insert("default".to_string(), default.clone());
        }
        properties.insert(input_name.clone(), Value::Object(property));

        if input.required && input.default.is_none() {
            required.push(input_name.clone());
        }
    }

    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

fn json_schema_type(input_type: InputType) -> &'static str {
    match input_type {
        InputType::String => "string",
        InputType::Number => "number",
        InputType::Boolean => "boolean",
        InputType::Object => "object",
        InputType::Array => "array",
    }
}
