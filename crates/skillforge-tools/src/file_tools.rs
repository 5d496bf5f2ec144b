//! File tools: read, write, and list directory.
//!
//! All three enforce workspace containment by canonicalizing paths and
//! verifying they remain within the configured workspace directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::{LocalTool, ToolError};

/// Validate that `path` resolves to a location within `workspace`.
///
/// Returns the canonical path on success, or a [`ToolError`] if the path
/// does not exist or escapes the workspace (including via a symlink).
fn validate_path(path: &str, workspace: &Path) -> Result<PathBuf, ToolError> {
    let resolved = workspace.join(path);
    let canonical =
        std::fs::canonicalize(&resolved).map_err(|_| ToolError::FileNotFound(path.to_string()))?;

    let workspace_canonical = std::fs::canonicalize(workspace)
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

    if !canonical.starts_with(&workspace_canonical) {
        return Err(ToolError::InvalidPath(format!(
            "path escapes workspace: {path}"
        )));
    }
    Ok(canonical)
}

/// Validate that a parent directory is within workspace, for paths that
/// do not yet exist (write operations creating new files).
fn validate_parent_path(path: &str, workspace: &Path) -> Result<PathBuf, ToolError> {
    let resolved = workspace.join(path);

    let mut ancestor = resolved.as_path();
    loop {
        if ancestor.exists() {
            break;
        }
        ancestor = ancestor
            .parent()
            .ok_or_else(|| ToolError::InvalidPath(format!("path escapes workspace: {path}")))?;
    }

    let canonical_ancestor =
        std::fs::canonicalize(ancestor).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
    let workspace_canonical = std::fs::canonicalize(workspace)
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

    if !canonical_ancestor.starts_with(&workspace_canonical) {
        return Err(ToolError::InvalidPath(format!(
            "path escapes workspace: {path}"
        )));
    }
    Ok(resolved)
}

fn required_str(args: &serde_json::Value, field: &str) -> Result<String, ToolError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing required field: {field}")))
}

// ---------------------------------------------------------------------------
// ReadFileTool
// ---------------------------------------------------------------------------

/// Read the contents of a file within the workspace.
pub struct ReadFileTool {
    workspace: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl LocalTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read (relative to workspace)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path_str = required_str(&args, "path")?;
        let canonical = validate_path(&path_str, &self.workspace)?;

        debug!(path = %canonical.display(), "reading file");

        let content = tokio::fs::read_to_string(&canonical)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("read failed: {e}")))?;

        Ok(json!({ "content": content }))
    }
}

// ---------------------------------------------------------------------------
// WriteFileTool
// ---------------------------------------------------------------------------

/// Write content to a file within the workspace, creating parent
/// directories as needed and overwriting an existing file.
pub struct WriteFileTool {
    workspace: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl LocalTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Creates parent directories if needed."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to (relative to workspace)"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path_str = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let target = validate_parent_path(&path_str, &self.workspace)?;

        debug!(path = %target.display(), bytes = content.len(), "writing file");

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("write failed: {e}")))?;
        }
        tokio::fs::write(&target, &content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("write failed: {e}")))?;

        Ok(json!({
            "message": format!("Successfully wrote {} bytes to {}", content.len(), path_str)
        }))
    }
}

// ---------------------------------------------------------------------------
// ListDirectoryTool
// ---------------------------------------------------------------------------

/// List the contents of a directory within the workspace.
pub struct ListDirectoryTool {
    workspace: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl LocalTool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the contents of a directory with metadata (name, is_dir, size)."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list (relative to workspace)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path_str = required_str(&args, "path")?;
        let canonical = validate_path(&path_str, &self.workspace)?;

        debug!(path = %canonical.display(), "listing directory");

        let mut read_dir = tokio::fs::read_dir(&canonical)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("list_dir failed: {e}")))?;

        let mut result = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("list_dir failed: {e}")))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("stat failed: {e}")))?;
            result.push(json!({
                "name": entry.file_name().to_string_lossy().into_owned(),
                "is_dir": metadata.is_dir(),
                "size": metadata.len(),
            }));
        }

        result.sort_by(|a, b| {
            let na = a["name"].as_str().unwrap_or("");
            let nb = b["name"].as_str().unwrap_or("");
            na.cmp(nb)
        });

        Ok(json!({ "entries": result }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
