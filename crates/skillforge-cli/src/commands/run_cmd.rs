//! `skillforge run` -- ad-hoc workflow invocation over the reference tools.
//!
//! Drives the [`Registry`] façade directly, in-process, over a
//! [`ReferenceToolCaller`](skillforge_tools::ReferenceToolCaller) rooted
//! at a workspace directory the `fs__*` tools are sandboxed to.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use skillforge_core::registry::Registry;
use skillforge_core::tool_caller::CallContext;
use skillforge_tools::url_safety::UrlPolicy;
use skillforge_tools::{ReferenceToolCaller, ReferenceToolCallerConfig};

use super::resolve_root;

/// Arguments for `skillforge run`.
#[derive(Args)]
pub struct RunArgs {
    /// Store root directory (skills live under `<root>/skills/`).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Name of the skill to run.
    pub name: String,

    /// Workspace directory the reference `fs__*` tools are sandboxed to.
    /// Defaults to the current directory.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// One workflow input as `key=value`; the value is parsed as JSON
    /// when possible, otherwise kept as a plain string. May be repeated.
    #[arg(long = "input", value_parser = parse_input)]
    pub inputs: Vec<(String, Value)>,

    /// Allow the `web__fetch` tool to reach private/reserved IP ranges.
    #[arg(long)]
    pub allow_private_urls: bool,
}

fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

/// Run the skill named `args.name` with `args.inputs` and print the
/// assembled result (or the typed error) to stdout.
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let root = resolve_root(args.root);
    let workspace = args
        .workspace
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    tokio::fs::create_dir_all(&workspace).await?;

    let mut url_policy = UrlPolicy::default();
    url_policy.allow_private = args.allow_private_urls;

    let tool_caller = Arc::new(ReferenceToolCaller::new(ReferenceToolCallerConfig {
        workspace,
        url_policy,
    }));

    let registry = Registry::new(&root, tool_caller);
    registry.initialize().await?;

    let arguments = Value::Object(args.inputs.into_iter().collect());
    let ctx = CallContext::new(CancellationToken::new());
    let result = registry.call_tool(&ctx, &args.name, arguments).await?;

    if result.is_error {
        eprintln!("{}", result.text());
        anyhow::bail!("'{}' completed with an error result", args.name);
    }
    println!("{}", result.text());
    Ok(())
}
