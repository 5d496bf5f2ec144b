//! `skillforge` subcommands: skill CRUD over the [`skillforge_core::store::Store`]
//! and ad-hoc workflow invocation over the reference tools in `skillforge-tools`.

pub mod run_cmd;
pub mod skills_cmd;

use std::path::PathBuf;

/// Resolve the store root: `--root`, else `SKILLFORGE_ROOT`, else
/// `~/.skillforge` (mirroring the teacher's `~/.clawft` convention).
/// Skills themselves live one level down, under `<root>/skills/<name>/`.
pub fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.or_else(|| std::env::var_os("SKILLFORGE_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".skillforge")
        })
}
