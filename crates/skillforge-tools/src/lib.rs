//! # skillforge-tools
//!
//! A reference [`ToolCaller`](skillforge_core::tool_caller::ToolCaller)
//! implementation built from small, sandboxed tools: file read/write/list
//! and HTTP fetch. Mirrors `clawft-tools`' per-tool shape (`name`,
//! `description`, `parameters`, `execute`) while adapting it to the
//! engine's single `server__tool`-keyed `call` entry point.
//!
//! # Tools
//!
//! - **File tools** ([`file_tools`]): `fs__read_file`, `fs__write_file`,
//!   `fs__list_directory`, each sandboxed to a configured workspace root.
//! - **Web fetch** ([`web_fetch`]): `web__fetch`, guarded by
//!   [`url_safety::validate_url`] against SSRF.

pub mod file_tools;
pub mod url_safety;
pub mod web_fetch;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use skillforge_core::tool_caller::{CallContext, ToolCallResult, ToolCaller};
use url_safety::UrlPolicy;

/// A tool-level failure: the tool ran but could not complete the request.
/// The registry surfaces these as `Ok(ToolCallResult { isError: true, .. })`,
/// never as a transport-level `Err`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// The per-tool shape every tool in this crate implements: name,
/// description, a JSON-Schema `parameters` object, and an `execute` that
/// maps arguments to a result value or a [`ToolError`].
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Configuration for [`ReferenceToolCaller::new`].
pub struct ReferenceToolCallerConfig {
    /// Directory file tools are sandboxed to.
    pub workspace: PathBuf,
    /// SSRF policy applied to `web__fetch`.
    pub url_policy: UrlPolicy,
}

/// Wires [`file_tools`] and [`web_fetch`] behind the
/// [`ToolCaller`] contract the executor drives every workflow step
/// through. Tool names follow the `server__tool` grammar with two
/// namespaces: `fs` (file tools) and `web` (fetch).
pub struct ReferenceToolCaller {
    tools: HashMap<String, Arc<dyn LocalTool>>,
}

impl ReferenceToolCaller {
    pub fn new(config: ReferenceToolCallerConfig) -> Self {
        let mut tools: HashMap<String, Arc<dyn LocalTool>> = HashMap::new();

        let read = Arc::new(file_tools::ReadFileTool::new(config.workspace.clone()));
        let write = Arc::new(file_tools::WriteFileTool::new(config.workspace.clone()));
        let list = Arc::new(file_tools::ListDirectoryTool::new(config.workspace.clone()));
        let fetch = Arc::new(web_fetch::WebFetchTool::new(config.url_policy));

        tools.insert(format!("fs__{}", read.name()), read);
        tools.insert(format!("fs__{}", write.name()), write);
        tools.insert(format!("fs__{}", list.name()), list);
        tools.insert(format!("web__{}", fetch.name()), fetch);

        Self { tools }
    }

    /// The tools this caller exposes, in `{name, description, parameters}`
    /// form -- useful for a CLI listing or a registry that wants to
    /// surface the reference tools alongside skill-derived ones.
    pub fn descriptors(&self) -> Vec<(String, String, Value)> {
        let mut entries: Vec<_> = self
            .tools
            .iter()
            .map(|(full_name, tool)| {
                (
                    full_name.clone(),
                    tool.description().to_string(),
                    tool.parameters(),
                )
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[async_trait]
impl ToolCaller for ReferenceToolCaller {
    async fn call(
        &self,
        _ctx: &CallContext,
        name: &str,
        arguments: Value,
    ) -> std::io::Result<ToolCallResult> {
        let Some(tool) = self.tools.get(name) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such tool: {name}"),
            ));
        };

        match tool.execute(arguments).await {
            Ok(value) => Ok(ToolCallResult::ok(value.to_string())),
            Err(err) => {
                warn!(tool = %name, error = %err, "tool reported failure");
                Ok(ToolCallResult::error(err.to_string()))
            }
        }
    }
}
