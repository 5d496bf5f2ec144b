//! `skillforge skills` -- CRUD over the on-disk skill store.
//!
//! Mirrors the teacher's `weft skills` subcommand family (`list`/`show`/
//! `install`/`remove`), adapted to skillforge's `Store`: skills are
//! loaded from and persisted to `<root>/skills/<name>/SKILL.md` rather
//! than discovered across workspace/user/builtin search paths.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use comfy_table::{presets, Table};

use skillforge_core::store::Store;
use skillforge_core::validator;
use skillforge_types::skill::{Skill, SkillState};

use super::resolve_root;

/// Arguments for the `skillforge skills` subcommand.
#[derive(Args)]
pub struct SkillsArgs {
    /// Store root directory (skills live under `<root>/skills/`).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub action: SkillsAction,
}

/// Subcommands for `skillforge skills`.
#[derive(Subcommand)]
pub enum SkillsAction {
    /// List all skills in the store.
    List,

    /// Show a skill's frontmatter and body.
    Show {
        /// Skill name to inspect.
        name: String,
    },

    /// Create a new draft skill with a description.
    Create {
        /// Skill name (lowercase kebab-case).
        name: String,

        /// Human-readable description.
        #[arg(long)]
        description: String,
    },

    /// Validate a skill against the semantic rules (§4.2): step refs,
    /// tool syntax, output policy, allowed-tools consistency.
    Validate {
        /// Skill name to validate.
        name: String,
    },

    /// Set a skill's lifecycle state (draft, active, disabled).
    SetState {
        /// Skill name to update.
        name: String,

        /// New state: draft, active, or disabled.
        state: String,
    },

    /// Rename a skill, moving its directory and rewriting frontmatter.
    Rename {
        /// Current skill name.
        name: String,

        /// New skill name.
        new_name: String,
    },

    /// Delete a skill and its directory.
    Delete {
        /// Skill name to delete.
        name: String,
    },
}

/// Run the skills subcommand.
pub async fn run(args: SkillsArgs) -> anyhow::Result<()> {
    let root = resolve_root(args.root);
    let store = Store::new(&root);
    store.load().await?;

    match args.action {
        SkillsAction::List => skills_list(&store).await,
        SkillsAction::Show { name } => skills_show(&store, &name).await,
        SkillsAction::Create { name, description } => {
            skills_create(&store, &name, &description).await
        }
        SkillsAction::Validate { name } => skills_validate(&store, &name).await,
        SkillsAction::SetState { name, state } => skills_set_state(&store, &name, &state).await,
        SkillsAction::Rename { name, new_name } => {
            skills_rename(&store, &name, &new_name).await
        }
        SkillsAction::Delete { name } => skills_delete(&store, &name).await,
    }
}

async fn skills_list(store: &Store) -> anyhow::Result<()> {
    let mut skills = store.list().await;
    if skills.is_empty() {
        println!("No skills found.");
        return Ok(());
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(["NAME", "STATE", "EXECUTABLE", "DESCRIPTION"]);

    for skill in &skills {
        table.add_row([
            skill.name.as_str(),
            state_label(skill.state),
            if skill.is_executable() { "yes" } else { "no" },
            skill.description.as_str(),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn skills_show(store: &Store, name: &str) -> anyhow::Result<()> {
    let skill = store.get(name).await?;

    println!("name:          {}", skill.name);
    println!("description:   {}", skill.description);
    println!("state:         {}", state_label(skill.state));
    println!("executable:    {}", skill.is_executable());
    println!("file count:    {}", skill.file_count);
    if let Some(license) = &skill.license {
        println!("license:       {license}");
    }
    if let Some(compat) = &skill.compatibility {
        println!("compatibility: {compat}");
    }
    if !skill.allowed_tools.is_empty() {
        println!("allowed tools: {}", skill.allowed_tools.join(" "));
    }
    if !skill.inputs.is_empty() {
        println!("inputs:");
        for (input_name, input) in &skill.inputs {
            println!(
                "  {input_name}: {:?} (required={})",
                input.input_type, input.required
            );
        }
    }
    if !skill.workflow.is_empty() {
        println!("workflow steps:");
        for step in &skill.workflow {
            println!("  {} -> {}", step.id, step.tool);
        }
    }
    println!();
    println!("{}", skill.body);
    Ok(())
}

async fn skills_create(store: &Store, name: &str, description: &str) -> anyhow::Result<()> {
    let skill = Skill::new(name, description);
    store.save_skill(skill).await?;
    println!("Created draft skill '{name}'.");
    Ok(())
}

async fn skills_validate(store: &Store, name: &str) -> anyhow::Result<()> {
    let skill = store.get(name).await?;
    let report = validator::validate(&skill);

    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for error in &report.errors {
        println!("error: {error}");
    }

    if report.is_ok() {
        println!("'{name}' is valid.");
        Ok(())
    } else {
        anyhow::bail!("'{name}' failed validation with {} error(s)", report.errors.len())
    }
}

async fn skills_set_state(store: &Store, name: &str, state: &str) -> anyhow::Result<()> {
    let mut skill = store.get(name).await?;
    skill.state = parse_state(state)?;
    store.save_skill(skill).await?;
    println!("'{name}' is now {state}.");
    Ok(())
}

async fn skills_rename(store: &Store, name: &str, new_name: &str) -> anyhow::Result<()> {
    store.rename_skill(name, new_name).await?;
    println!("Renamed '{name}' to '{new_name}'.");
    Ok(())
}

async fn skills_delete(store: &Store, name: &str) -> anyhow::Result<()> {
    store.delete_skill(name).await?;
    println!("Deleted '{name}'.");
    Ok(())
}

fn state_label(state: SkillState) -> &'static str {
    match state {
        SkillState::Draft => "draft",
        SkillState::Active => "active",
        SkillState::Disabled => "disabled",
    }
}

fn parse_state(state: &str) -> anyhow::Result<SkillState> {
    match state {
        "draft" => Ok(SkillState::Draft),
        "active" => Ok(SkillState::Active),
        "disabled" => Ok(SkillState::Disabled),
        other => anyhow::bail!("invalid state '{other}': expected draft, active, or disabled"),
    }
}
