//! `skillforge` -- CLI demonstrator for the skillforge workflow engine.
//!
//! Drives the `Store` and `Registry` façade directly, in-process, over
//! the reference tools in `skillforge-tools`, without any network surface.
//!
//! - `skillforge skills` -- skill CRUD (list, show, create, validate,
//!   set-state, rename, delete).
//! - `skillforge run` -- ad-hoc workflow invocation.

use clap::{Parser, Subcommand};

mod commands;

/// skillforge CLI.
#[derive(Parser)]
#[command(
    name = "skillforge",
    about = "skillforge workflow engine CLI",
    version,
    disable_help_subcommand = true
)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Manage skills (list, show, create, validate, set-state, rename, delete).
    Skills(commands::skills_cmd::SkillsArgs),

    /// Run a skill's workflow against the reference tools.
    Run(commands::run_cmd::RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Skills(args) => commands::skills_cmd::run(args).await?,
        Commands::Run(args) => commands::run_cmd::run(args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_without_error() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_help_contains_binary_name() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("skillforge"));
    }

    #[test]
    fn cli_has_all_subcommands() {
        let cmd = Cli::command();
        let sub_names: Vec<&str> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert!(sub_names.contains(&"skills"));
        assert!(sub_names.contains(&"run"));
    }

    #[test]
    fn cli_skills_list_parses() {
        assert!(Cli::try_parse_from(["skillforge", "skills", "list"]).is_ok());
    }

    #[test]
    fn cli_skills_create_parses() {
        let result = Cli::try_parse_from([
            "skillforge",
            "skills",
            "create",
            "my-skill",
            "--description",
            "does a thing",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn cli_skills_show_parses() {
        assert!(Cli::try_parse_from(["skillforge", "skills", "show", "my-skill"]).is_ok());
    }

    #[test]
    fn cli_skills_set_state_parses() {
        let result = Cli::try_parse_from(["skillforge", "skills", "set-state", "my-skill", "active"]);
        assert!(result.is_ok());
    }

    #[test]
    fn cli_skills_rename_parses() {
        let result = Cli::try_parse_from(["skillforge", "skills", "rename", "old", "new"]);
        assert!(result.is_ok());
    }

    #[test]
    fn cli_skills_delete_parses() {
        assert!(Cli::try_parse_from(["skillforge", "skills", "delete", "my-skill"]).is_ok());
    }

    #[test]
    fn cli_run_parses_with_inputs() {
        let result = Cli::try_parse_from([
            "skillforge",
            "run",
            "my-skill",
            "--input",
            "query=hello",
            "--input",
            "limit=5",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn cli_verbose_flag_is_global() {
        let result = Cli::try_parse_from(["skillforge", "--verbose", "skills", "list"]);
        assert!(result.is_ok());
        assert!(result.unwrap().verbose);
    }
}
