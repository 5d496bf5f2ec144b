//! The shared name grammar (§3): lowercase kebab-case, 1-64 characters,
//! no leading, trailing, or consecutive hyphens.
//!
//! Used for both [`crate::skill::Skill::name`] and
//! [`crate::skill::WorkflowStep::id`] -- the spec calls out that step ids
//! follow "the same grammar as skill name".

/// Returns `true` iff `s` is a valid kebab-case identifier: 1-64 ASCII
/// lowercase alphanumeric characters and single hyphens, with no leading,
/// trailing, or consecutive hyphen.
pub fn is_valid(s: &str) -> bool {
    if s.is_empty() || s.len() > 64 {
        return false;
    }
    if s.starts_with('-') || s.ends_with('-') {
        return false;
    }
    if s.contains("--") {
        return false;
    }
    s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
