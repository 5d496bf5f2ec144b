//! # skillforge-types
//!
//! Core data model and error types for the skillforge workflow engine.
//!
//! This crate is the foundation of the dependency graph -- the codec,
//! validator, planner, template engine, store, and executor in
//! `skillforge-core` all build on the types defined here. It contains:
//!
//! - **[`error`]** -- [`SkillforgeError`], the shared error taxonomy
//! - **[`name`]** -- the kebab-case grammar shared by skill names and step ids
//! - **[`skill`]** -- [`skill::Skill`], [`skill::WorkflowStep`], and the rest
//!   of the on-disk data model (§3 of the design document)
//! - **[`step_result`]** -- [`step_result::StepResult`], the per-step and
//!   per-workflow execution outcome

pub mod error;
pub mod name;
pub mod skill;
pub mod step_result;

pub use error::{Result, SkillforgeError};
pub use skill::Skill;
