//! Integration tests for security policies across tool implementations.
//!
//! Validates that workspace containment and [`UrlPolicy`] are correctly
//! enforced when wired through [`ReferenceToolCaller`]'s single `call`
//! entry point -- the same path the executor drives every workflow step
//! through. These tests exercise it end to end: tool name lookup, JSON
//! argument extraction, the tool's own validation, and the
//! `ToolCallResult` it reports back.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use skillforge_core::tool_caller::{CallContext, ToolCaller};
use skillforge_tools::url_safety::{is_blocked_ip, validate_url, UrlPolicy};
use skillforge_tools::{ReferenceToolCaller, ReferenceToolCallerConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ctx() -> CallContext {
    CallContext::new(CancellationToken::new())
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_workspace() -> std::path::PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "skillforge-security-it-{}-{id}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn caller(workspace: std::path::PathBuf, url_policy: UrlPolicy) -> ReferenceToolCaller {
    ReferenceToolCaller::new(ReferenceToolCallerConfig {
        workspace,
        url_policy,
    })
}

// ---------------------------------------------------------------------------
// Workspace containment, exercised through the ToolCaller entry point
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_file_escaping_workspace_is_a_tool_level_error() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "fs__read_file",
            json!({"path": "../../../etc/passwd"}),
        )
        .await
        .unwrap();

    assert!(
        result.is_error,
        "traversal must surface as a tool-level error, not succeed"
    );
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn write_file_escaping_workspace_is_a_tool_level_error() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "fs__write_file",
            json!({"path": "../escape.txt", "content": "leaked"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    let outside = ws.parent().unwrap().join("escape.txt");
    assert!(!outside.exists(), "write must not land outside the workspace");
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn unknown_tool_name_is_a_transport_error_not_a_tool_result() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let err = c
        .call(
            &ctx(),
            "shell__exec",
            json!({"command": "rm -rf /"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn list_directory_respects_workspace_boundary() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "fs__list_directory",
            json!({"path": "/etc"}),
        )
        .await
        .unwrap();

    assert!(
        result.is_error,
        "absolute path outside workspace must be rejected"
    );
    let _ = std::fs::remove_dir_all(&ws);
}

// ---------------------------------------------------------------------------
// web__fetch SSRF guard, exercised through the ToolCaller entry point
// ---------------------------------------------------------------------------

#[tokio::test]
async fn web_fetch_rejects_metadata_endpoint() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "http://169.254.169.254/latest/meta-data/"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(result.text().contains("blocked"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn web_fetch_rejects_private_ip_by_default() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "http://10.0.0.1/"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(result.text().contains("blocked"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn web_fetch_honors_allow_private_override() {
    let ws = temp_workspace();
    let mut policy = UrlPolicy::default();
    policy.allow_private = true;
    let c = caller(ws.clone(), policy);

    // Still a tool-level failure (nothing listens on this port), but it
    // must fail on the network call, not on the SSRF guard.
    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "http://127.0.0.1:1/"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(
        !result.text().contains("blocked"),
        "allow_private should bypass the SSRF guard entirely: {}",
        result.text()
    );
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn web_fetch_rejects_explicitly_blocked_domain() {
    let ws = temp_workspace();
    let mut policy = UrlPolicy::default();
    policy.blocked_domains.insert("evil.example".to_string());
    let c = caller(ws.clone(), policy);

    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "http://evil.example/"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(result.text().contains("blocked"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn web_fetch_permissive_policy_skips_ssrf_guard() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::permissive());

    // Permissive policy lets the URL through the guard; it still fails
    // because nothing is listening, but not due to the SSRF check.
    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "http://127.0.0.1:1/"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(!result.text().contains("blocked"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[tokio::test]
async fn web_fetch_rejects_non_http_scheme_before_policy_runs() {
    let ws = temp_workspace();
    let c = caller(ws.clone(), UrlPolicy::default());

    let result = c
        .call(
            &ctx(),
            "web__fetch",
            json!({"url": "file:///etc/passwd"}),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(result.text().contains("http"));
    let _ = std::fs::remove_dir_all(&ws);
}

// ---------------------------------------------------------------------------
// Direct policy-function checks, end to end with real socket resolution
// ---------------------------------------------------------------------------

#[test]
fn validate_url_resolves_and_blocks_localhost_by_name() {
    let policy = UrlPolicy::default();
    let err = validate_url("http://localhost/", &policy).unwrap_err();
    let message = err.to_string().to_lowercase();
    assert!(message.contains("private") || message.contains("resolve"));
}

#[test]
fn is_blocked_ip_matches_url_policy_decision() {
    let ip: std::net::IpAddr = "172.31.0.5".parse().unwrap();
    assert!(is_blocked_ip(ip));
    assert!(validate_url("http://172.31.0.5/", &UrlPolicy::default()).is_err());
}
