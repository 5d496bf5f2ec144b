//! CLI integration tests for the `skillforge` binary.
//!
//! These tests run the actual compiled binary via `std::process::Command`
//! to verify end-to-end CLI behavior. Each test points `SKILLFORGE_ROOT`
//! at a fresh temporary directory so skill stores never collide and never
//! touch a real `~/.skillforge`.

use std::path::Path;
use std::process::Command;

/// Build a `Command` pointing at the compiled `skillforge` binary, rooted
/// at `root`.
fn skillforge_bin(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_skillforge"));
    cmd.env("SKILLFORGE_ROOT", root);
    // Suppress tracing output so test assertions only match program output.
    cmd.env("RUST_LOG", "off");
    cmd
}

fn temp_root() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "skillforge-cli-it-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ── 1. Version and help ─────────────────────────────────────────────────

#[test]
fn version_output() {
    let root = temp_root();
    let output = skillforge_bin(&root).arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skillforge"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn help_lists_subcommands() {
    let root = temp_root();
    let output = skillforge_bin(&root).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skills"));
    assert!(stdout.contains("run"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn no_subcommand_fails_with_usage() {
    let root = temp_root();
    let output = skillforge_bin(&root).output().unwrap();
    assert!(!output.status.success());
    let _ = std::fs::remove_dir_all(&root);
}

// ── 2. Skill CRUD lifecycle ──────────────────────────────────────────────

#[test]
fn skills_list_on_empty_store_reports_no_skills() {
    let root = temp_root();
    let output = skillforge_bin(&root)
        .args(["skills", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No skills found"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_create_then_list_then_show() {
    let root = temp_root();

    let create = skillforge_bin(&root)
        .args(["skills", "create", "greeter", "--description", "says hello"])
        .output()
        .unwrap();
    assert!(create.status.success(), "{}", String::from_utf8_lossy(&create.stderr));

    let list = skillforge_bin(&root).args(["skills", "list"]).output().unwrap();
    assert!(list.status.success());
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("greeter"));
    assert!(stdout.contains("draft"));

    let show = skillforge_bin(&root)
        .args(["skills", "show", "greeter"])
        .output()
        .unwrap();
    assert!(show.status.success());
    let stdout = String::from_utf8_lossy(&show.stdout);
    assert!(stdout.contains("greeter"));
    assert!(stdout.contains("says hello"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_show_missing_skill_fails() {
    let root = temp_root();
    let output = skillforge_bin(&root)
        .args(["skills", "show", "nonexistent"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_set_state_rejects_unknown_state() {
    let root = temp_root();
    skillforge_bin(&root)
        .args(["skills", "create", "demo", "--description", "demo skill"])
        .output()
        .unwrap();

    let output = skillforge_bin(&root)
        .args(["skills", "set-state", "demo", "paused"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid state"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_set_state_then_list_reflects_active() {
    let root = temp_root();
    skillforge_bin(&root)
        .args(["skills", "create", "demo", "--description", "demo skill"])
        .output()
        .unwrap();

    let set_state = skillforge_bin(&root)
        .args(["skills", "set-state", "demo", "active"])
        .output()
        .unwrap();
    assert!(set_state.status.success());

    let list = skillforge_bin(&root).args(["skills", "list"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("active"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_rename_moves_skill() {
    let root = temp_root();
    skillforge_bin(&root)
        .args(["skills", "create", "old-name", "--description", "before rename"])
        .output()
        .unwrap();

    let rename = skillforge_bin(&root)
        .args(["skills", "rename", "old-name", "new-name"])
        .output()
        .unwrap();
    assert!(rename.status.success(), "{}", String::from_utf8_lossy(&rename.stderr));

    let show_old = skillforge_bin(&root)
        .args(["skills", "show", "old-name"])
        .output()
        .unwrap();
    assert!(!show_old.status.success());

    let show_new = skillforge_bin(&root)
        .args(["skills", "show", "new-name"])
        .output()
        .unwrap();
    assert!(show_new.status.success());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_delete_removes_skill() {
    let root = temp_root();
    skillforge_bin(&root)
        .args(["skills", "create", "throwaway", "--description", "will be deleted"])
        .output()
        .unwrap();

    let delete = skillforge_bin(&root)
        .args(["skills", "delete", "throwaway"])
        .output()
        .unwrap();
    assert!(delete.status.success());

    let list = skillforge_bin(&root).args(["skills", "list"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("No skills found"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn skills_validate_reports_errors_for_tool_not_covered_by_allowed_tools() {
    let root = temp_root();
    let skill_dir = root.join("skills").join("broken");
    std::fs::create_dir_all(&skill_dir).unwrap();
    std::fs::write(
        skill_dir.join("SKILL.md"),
        "---\n\
name: broken\n\
description: uses a tool that isn't covered by allowed_tools\n\
state: draft\n\
allowed_tools: [web__fetch]\n\
workflow:\n\
  - id: step1\n\
    tool: fs__read_file\n\
    args: {}\n\
---\n\
Body text.\n",
    )
    .unwrap();

    let output = skillforge_bin(&root)
        .args(["skills", "validate", "broken"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let _ = std::fs::remove_dir_all(&root);
}

// ── 3. Ad-hoc workflow invocation ───────────────────────────────────────

#[test]
fn run_against_missing_skill_fails() {
    let root = temp_root();
    let output = skillforge_bin(&root)
        .args(["run", "does-not-exist"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn run_against_draft_skill_fails_because_it_is_not_active() {
    let root = temp_root();
    skillforge_bin(&root)
        .args(["skills", "create", "idle", "--description", "never activated"])
        .output()
        .unwrap();

    let output = skillforge_bin(&root).args(["run", "idle"]).output().unwrap();
    assert!(!output.status.success());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn run_executes_single_step_fs_workflow_end_to_end() {
    let root = temp_root();
    let workspace = root.join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("greeting.txt"), "hello from disk").unwrap();

    let skill_dir = root.join("skills").join("reader");
    std::fs::create_dir_all(&skill_dir).unwrap();
    std::fs::write(
        skill_dir.join("SKILL.md"),
        "---\n\
name: reader\n\
description: reads a fixed file back\n\
state: active\n\
allowed_tools: [fs__read_file]\n\
workflow:\n\
  - id: step1\n\
    tool: fs__read_file\n\
    args:\n\
      path: greeting.txt\n\
---\n\
Reads greeting.txt from the workspace.\n",
    )
    .unwrap();

    let output = skillforge_bin(&root)
        .args(["run", "reader", "--workspace"])
        .arg(&workspace)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello from disk"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn run_rejects_malformed_input_without_equals_sign() {
    let root = temp_root();
    let output = skillforge_bin(&root)
        .args(["run", "whatever", "--input", "no-equals-here"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let _ = std::fs::remove_dir_all(&root);
}
