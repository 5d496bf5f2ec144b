//! The skill data model: static metadata plus an optional executable
//! workflow of tool-call steps.
//!
//! A [`Skill`] is the unified representation of a `SKILL.md` document
//! regardless of whether it carries a `workflow` block. [`Skill::is_executable`]
//! reports whether the skill has at least one step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a skill.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkillState {
    /// Not yet ready for use; the default for newly-saved skills.
    #[default]
    Draft,
    /// Ready to be exposed by the registry façade.
    Active,
    /// Present on disk but excluded from the façade's tool listing.
    Disabled,
}

/// The type of a declared workflow input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// One declared input to a skill's workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillInput {
    /// The input's expected type.
    #[serde(rename = "type")]
    pub input_type: InputType,

    /// Human-readable description shown in the generated JSON-Schema.
    #[serde(default)]
    pub description: String,

    /// Whether the caller must supply this input when no default exists.
    #[serde(default)]
    pub required: bool,

    /// Value substituted when the caller omits this input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Allowed string values; empty means unconstrained.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

/// What to do when a step's tool call fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record the error; downstream dependents are skipped (default).
    #[default]
    Fail,
    /// Mark the step `skipped`; downstream dependents are skipped likewise.
    Skip,
    /// Treat the step as completed with `isError = true`; downstream runs.
    Continue,
}

/// Retry configuration for a single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), minimum 1.
    #[serde(rename = "maxAttempts", alias = "max_attempts")]
    pub max_attempts: u32,
    /// Constant delay between attempts, a duration string (e.g. `"1ms"`).
    pub backoff: String,
}

/// Deserializes a YAML scalar string as a one-element list, or a sequence
/// as-is, normalizing `workflow[].dependsOn` per §9's "dynamic YAML
/// scalars" design note. Accepts the `depends_on` snake_case spelling as
/// an alias since §6 documents that form alongside §3's `dependsOn`.
fn deserialize_string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        Single(String),
        Many(Vec<String>),
        #[serde(skip)]
        #[allow(dead_code)]
        Never(()),
    }

    match Option::<StringOrVec>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(StringOrVec::Single(s)) => Ok(vec![s]),
        Some(StringOrVec::Many(v)) => Ok(v),
        Some(StringOrVec::Never(())) => unreachable!(),
    }
}

/// Deserializes `allowed-tools` from its authored form, a single
/// whitespace-separated string (e.g. `"Bash(git:*) Read"`), splitting it
/// into individual tokens. A YAML sequence is accepted as-is, for callers
/// that prefer an explicit list.
fn deserialize_allowed_tools<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        Single(String),
        Many(Vec<String>),
    }

    match Option::<StringOrVec>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(StringOrVec::Single(s)) => {
            Ok(s.split_whitespace().map(str::to_string).collect())
        }
        Some(StringOrVec::Many(v)) => Ok(v),
    }
}

/// Serializes `allowed-tools` back into its authored single-string form,
/// joining tokens with a single space so that parse/render round-trips.
fn serialize_allowed_tools<S>(value: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.join(" "))
}

/// One entry in a skill's workflow; maps to exactly one Tool Caller
/// invocation (modulo retries).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    /// Step identifier, unique within the workflow, same grammar as a
    /// skill name.
    pub id: String,

    /// Tool name in `server__tool` form.
    pub tool: String,

    /// Arguments passed to the tool; string values may embed `{{ }}`
    /// template expressions.
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,

    /// Step ids that must complete before this step becomes runnable.
    #[serde(
        rename = "dependsOn",
        alias = "depends_on",
        default,
        deserialize_with = "deserialize_string_or_seq"
    )]
    pub depends_on: Vec<String>,

    /// Optional template expression gating whether this step runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Policy applied when the tool call errors.
    #[serde(rename = "onError", alias = "on_error", default)]
    pub on_error: OnError,

    /// Per-step deadline, a duration string (e.g. `"30s"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Retry configuration; absent means no retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

/// How the workflow's final text result is assembled from step results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Concatenate each executed step's result, separated by `---` (default).
    #[default]
    Merged,
    /// Return the last step (in declaration order) that ran successfully.
    Last,
    /// Render `template` through the template engine.
    Custom,
}

/// Policy describing how to assemble the workflow's final output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowOutput {
    /// Assembly strategy.
    #[serde(default)]
    pub format: OutputFormat,

    /// Step ids to include; empty means all executed steps, in declaration
    /// order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Required when `format = custom`; a template rendered against the
    /// full execution context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// The unified, typed representation of a `SKILL.md` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    /// Lowercase kebab-case identifier, 1-64 chars.
    ///
    /// Optional in the frontmatter itself (the directory name is the
    /// authoritative identity per §3); defaults to empty so the codec
    /// never rejects a file purely for omitting it.
    #[serde(default)]
    pub name: String,

    /// Human-readable summary, required, capped (with a warning) at 1024
    /// chars. Defaults to empty at parse time; enforced by the validator,
    /// not the codec.
    #[serde(default)]
    pub description: String,

    /// SPDX license identifier or free-form license text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Free-form compatibility note (e.g. target runtime versions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,

    /// Whitespace-separated tool allow-list, e.g. `Bash(git:*) Read`.
    #[serde(
        rename = "allowed-tools",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_allowed_tools",
        serialize_with = "serialize_allowed_tools"
    )]
    pub allowed_tools: Vec<String>,

    /// Free-form string-to-string metadata, rendered in a fixed key order
    /// so encoded output is byte-stable across runs (§4.1).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Lifecycle state; defaults to `draft`.
    #[serde(default)]
    pub state: SkillState,

    /// Declared workflow inputs, keyed by input name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, SkillInput>,

    /// Ordered list of workflow steps; empty means the skill is static
    /// knowledge rather than an executable workflow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflow: Vec<WorkflowStep>,

    /// Output assembly policy; only meaningful when `workflow` is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkflowOutput>,

    /// Markdown body following the frontmatter. Not part of the YAML block.
    #[serde(skip)]
    pub body: String,

    /// Count of non-directory entries under `scripts/`, `references/`, and
    /// `assets/` (shallow). Computed by the store, not stored in frontmatter.
    #[serde(skip)]
    pub file_count: usize,

    /// Relative on-disk directory name (normally equal to `name`).
    #[serde(skip)]
    pub dir: String,
}

impl Skill {
    /// Construct a minimal draft skill with no workflow.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dir: name.clone(),
            name,
            description: description.into(),
            license: None,
            compatibility: None,
            allowed_tools: Vec::new(),
            metadata: BTreeMap::new(),
            state: SkillState::default(),
            inputs: BTreeMap::new(),
            workflow: Vec::new(),
            output: None,
            body: String::new(),
            file_count: 0,
        }
    }

    /// A skill is executable iff it declares at least one workflow step.
    pub fn is_executable(&self) -> bool {
        !self.workflow.is_empty()
    }
}
