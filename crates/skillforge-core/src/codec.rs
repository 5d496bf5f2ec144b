//! Frontmatter codec (§4.1): deterministic parsing of a Markdown-with-YAML
//! header document into a typed [`Skill`], and the reverse rendering.
//!
//! Grounded in `clawft-core`'s `agent/skills_v2.rs::extract_frontmatter`,
//! generalized from a hand-rolled scalar/list parser to `serde_yaml`
//! decoding of the full typed [`Skill`] model (including nested workflow
//! steps), since the hybrid format here carries far more structure than
//! the teacher's flat key-value frontmatter.

use skillforge_types::{Result, Skill};

use crate::security;

/// Parse a `SKILL.md` document into a [`Skill`].
///
/// CRLF is normalized to LF before scanning. If the content does not begin
/// (after leading blank lines) with a `---` delimiter on its own line, or
/// no matching closing `---` line is found, the entire content is treated
/// as `body` and every frontmatter field is left at its default -- this
/// never errors. A present-but-malformed YAML block does error, with
/// [`skillforge_types::SkillforgeError::Yaml`]; a YAML block nested deeper
/// than [`security::MAX_YAML_DEPTH`] levels is rejected before parsing.
pub fn decode(content: &str) -> Result<Skill> {
    let normalized = normalize_crlf(content);
    match split_frontmatter(&normalized) {
        Some((yaml_block, body)) => {
            let mut skill: Skill = if yaml_block.trim().is_empty() {
                Skill::new(String::new(), String::new())
            } else {
                security::validate_yaml_depth(yaml_block)?;
                serde_yaml::from_str(yaml_block)?
            };
            skill.body = body.to_string();
            Ok(skill)
        }
        None => {
            let mut skill = Skill::new(String::new(), String::new());
            skill.body = normalized;
            Ok(skill)
        }
    }
}

/// Render a [`Skill`] back into `SKILL.md` form: opening delimiter,
/// canonical YAML of the known frontmatter fields in the fixed order they
/// are declared on [`Skill`], closing delimiter, then `body` unchanged.
pub fn encode(skill: &Skill) -> Result<String> {
    let yaml = serde_yaml::to_string(skill)?;
    Ok(format!("---\n{yaml}---\n{}", skill.body))
}

fn normalize_crlf(s: &str) -> String {
    s.replace("\r\n", "\n")
}

/// Split `content` into `(yaml_block, body)` if it opens with a `---`
/// delimiter line (after skipping leading blank lines) and a matching
/// closing `---` line is found. Both halves are exact substrings of
/// `content`, so `body` preserves internal `---` horizontal rules and is
/// byte-identical to what follows the closing delimiter.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim().is_empty() {
            offset += line.len();
            continue;
        }
        break;
    }
    let rest = &content[offset..];

    let first_line_end = rest.find('\n').map_or(rest.len(), |i| i + 1);
    let first_line = rest[..first_line_end].trim_end_matches('\n');
    if first_line != "---" {
        return None;
    }

    let after_open = &rest[first_line_end..];
    let mut pos = 0;
    loop {
        if pos >= after_open.len() {
            return None;
        }
        let line_end = after_open[pos..]
            .find('\n')
            .map_or(after_open.len(), |i| pos + i + 1);
        let line = after_open[pos..line_end].trim_end_matches('\n');
        if line == "---" {
            let yaml_block = &after_open[..pos];
            let body = &after_open[line_end..];
            return Some((yaml_block, body));
        }
        if line_end >= after_open.len() {
            return None;
        }
        pos = line_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillforge_types::skill::SkillState;

    #[test]
    fn decodes_minimal_skill() {
        let content = "---\nname: my-skill\ndescription: does a thing\n---\nSome body.";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "my-skill");
        assert_eq!(skill.description, "does a thing");
        assert_eq!(skill.body, "Some body.");
    }

    #[test]
    fn missing_opening_delimiter_is_whole_body() {
        let content = "just a plain markdown document";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "");
        assert_eq!(skill.body, content);
    }

    #[test]
    fn missing_closing_delimiter_is_whole_body() {
        let content = "---\nname: a\nno closing delimiter here";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "");
        assert_eq!(skill.body, content);
    }

    #[test]
    fn body_preserves_internal_horizontal_rules() {
        let content = "---\nname: a\ndescription: d\n---\nfirst\n\n---\n\nsecond";
        let skill = decode(content).unwrap();
        assert_eq!(skill.body, "first\n\n---\n\nsecond");
    }

    #[test]
    fn crlf_is_normalized_before_scanning() {
        let content = "---\r\nname: a\r\ndescription: d\r\n---\r\nbody line";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "a");
        assert_eq!(skill.body, "body line");
    }

    #[test]
    fn unknown_yaml_fields_are_tolerated() {
        let content = "---\nname: a\ndescription: d\nfuture_field: wow\n---\nbody";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "a");
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let content = "---\nname: [unterminated\n---\nbody";
        assert!(decode(content).is_err());
    }

    #[test]
    fn excessively_nested_yaml_is_rejected_before_parsing() {
        let mut yaml = String::from("metadata:\n");
        for level in 1..=12 {
            let indent = "  ".repeat(level);
            yaml.push_str(&format!("{indent}k{level}:\n"));
        }
        let content = format!("---\n{yaml}---\nbody");
        let err = decode(&content).unwrap_err();
        assert!(err.to_string().contains("nesting depth"));
    }

    #[test]
    fn state_defaults_to_draft_when_absent() {
        let content = "---\nname: a\ndescription: d\n---\nbody";
        let skill = decode(content).unwrap();
        assert_eq!(skill.state, SkillState::Draft);
    }

    #[test]
    fn round_trip_preserves_typed_fields_and_body() {
        let mut skill = Skill::new("round-trip", "round trips fields");
        skill.license = Some("MIT".into());
        skill.allowed_tools = vec!["Bash(git:*)".into(), "Read".into()];
        skill.body = "# Heading\n\nSome body with a --- rule.\n".into();

        let rendered = encode(&skill).unwrap();
        let decoded = decode(&rendered).unwrap();

        assert_eq!(decoded.name, skill.name);
        assert_eq!(decoded.description, skill.description);
        assert_eq!(decoded.license, skill.license);
        assert_eq!(decoded.allowed_tools, skill.allowed_tools);
        assert_eq!(decoded.body, skill.body);
    }

    #[test]
    fn encode_places_delimiters_and_body_correctly() {
        let skill = Skill::new("a", "d");
        let rendered = encode(&skill).unwrap();
        assert!(rendered.starts_with("---\n"));
        let mut parts = rendered.splitn(3, "---\n");
        assert_eq!(parts.next(), Some(""));
        let yaml = parts.next().unwrap();
        assert!(yaml.contains("name: a"));
        assert!(yaml.contains("description: d"));
    }

    #[test]
    fn leading_blank_lines_before_opening_delimiter_are_skipped() {
        let content = "\n\n---\nname: a\ndescription: d\n---\nbody";
        let skill = decode(content).unwrap();
        assert_eq!(skill.name, "a");
        assert_eq!(skill.body, "body");
    }
}
