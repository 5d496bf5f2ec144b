//! The `ToolCaller` contract (§6): the one interface the executor
//! consumes to actually perform work.
//!
//! Mirrors the shape of the teacher's `Tool` async-trait in
//! `clawft-core::tools::registry` (`name`/`description`/`parameters`/
//! `execute`), generalized to a single `call` entry point keyed by the
//! full `server__tool` name and carrying a [`CallContext`] the
//! implementation must honor.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use skillforge_types::{Result, SkillforgeError};

/// The cancellation token plus the composition call-stack it carries,
/// threaded through a (possibly recursive) chain of `Executor::run` calls
/// and out through every [`ToolCaller::call`] invocation.
///
/// Carrying the stack in the same value the executor hands to a
/// `ToolCaller` is what lets a `registry__<name>` step routed back through
/// a host's own `ToolCaller` implementation keep the composition guard
/// live end to end (§9) -- a host that calls back into a [`Registry`
/// `call_tool`][crate::registry::Registry::call_tool] with the `ctx` it
/// was given, rather than a fresh one, propagates the stack automatically.
#[derive(Clone)]
pub struct CallContext {
    pub cancellation: CancellationToken,
    call_stack: Arc<StdMutex<Vec<String>>>,
}

impl CallContext {
    /// Start a fresh call context with an empty composition stack.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            call_stack: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Push `skill_name` onto the composition stack, failing if it is
    /// already present (a cycle) or the stack would exceed `max_depth`.
    /// Returns a guard that pops the entry back off on drop.
    pub(crate) fn enter(&self, skill_name: &str, max_depth: usize) -> Result<StackGuard> {
        let mut stack = self.call_stack.lock().unwrap();
        if stack.iter().any(|s| s == skill_name) {
            return Err(SkillforgeError::CircularComposition(format!(
                "{} -> {skill_name}",
                stack.join(" -> ")
            )));
        }
        if stack.len() + 1 > max_depth {
            return Err(SkillforgeError::MaxDepthExceeded(max_depth));
        }
        stack.push(skill_name.to_string());
        drop(stack);
        Ok(StackGuard {
            call_stack: self.call_stack.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn push_test_frame(&self, skill_name: &str) {
        self.call_stack.lock().unwrap().push(skill_name.to_string());
    }
}

/// Pops the most recently pushed call-stack entry when dropped, so every
/// return path out of `Executor::run` (success, error, or panic unwind)
/// restores the stack.
pub(crate) struct StackGuard {
    call_stack: Arc<StdMutex<Vec<String>>>,
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        self.call_stack.lock().unwrap().pop();
    }
}

/// One block of a tool result's content. `content_type` is almost always
/// `"text"`; other fields beyond `text` are carried opaquely in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ContentBlock {
    /// Construct a plain `{type: "text", text}` block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// The result of a tool call: one or more content blocks plus an
/// error flag. The executor concatenates each block's `text` to obtain
/// the step's result string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Concatenate every content block's `text`, the representation the
    /// executor treats as "the step's result string".
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The contract the executor drives every workflow step through.
///
/// Implementations may dispatch to a local function, an MCP server, or a
/// remote process; the executor only cares that `call` honors
/// `ctx.cancellation` and returns promptly on deadline. A transport-level
/// failure (the tool could not be reached at all) should be surfaced as
/// `Err`; a tool that ran and reported failure should be surfaced as
/// `Ok(ToolCallResult { is_error: true, .. })`.
///
/// An implementation that routes a call back into another skill (a
/// `registry__<name>` composition step) MUST forward the same `ctx` it was
/// given rather than building a fresh one, so the composition call-stack
/// it carries keeps detecting cycles and enforcing the recursion depth
/// cap across the round trip (§9).
#[async_trait]
pub trait ToolCaller: Send + Sync {
    /// Invoke `name` (full `server__tool` form) with `arguments`, honoring
    /// `ctx`.
    async fn call(
        &self,
        ctx: &CallContext,
        name: &str,
        arguments: Value,
    ) -> std::io::Result<ToolCallResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_blocks() {
        let result = ToolCallResult {
            content: vec![ContentBlock::text("a"), ContentBlock::text("b")],
            is_error: false,
        };
        assert_eq!(result.text(), "ab");
    }

    #[test]
    fn ok_constructor_is_not_an_error() {
        let result = ToolCallResult::ok("done");
        assert!(!result.is_error);
        assert_eq!(result.text(), "done");
    }

    #[test]
    fn error_constructor_sets_is_error() {
        let result = ToolCallResult::error("boom");
        assert!(result.is_error);
    }
}
