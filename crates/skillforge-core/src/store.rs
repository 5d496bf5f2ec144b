//! Skill store (§4.5): the on-disk catalog under `<base>/skills/<name>/`,
//! plus the concurrency-safe in-memory index the registry façade and
//! executor read from.
//!
//! Root layout: `<base>/skills/<name>/SKILL.md` with optional supporting
//! subtrees `scripts/`, `references/`, `assets/`. A single `RwLock`
//! guards the index; every accessor returns a deep copy so callers cannot
//! mutate internal state through a returned reference (§8's "Isolation"
//! property).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tokio::sync::RwLock;
use tracing::warn;

use skillforge_types::skill::Skill;
use skillforge_types::{name, Result, SkillforgeError};

use crate::codec;
use crate::security;
use crate::validator;

const SUPPORTING_DIRS: [&str; 3] = ["scripts", "references", "assets"];
const SKILL_FILE: &str = "SKILL.md";

/// The on-disk skill catalog rooted at a base directory.
pub struct Store {
    root: PathBuf,
    index: RwLock<HashMap<String, Skill>>,
}

impl Store {
    /// Open a store rooted at `root` (skills live under `root/skills/`).
    /// Does not touch the filesystem; call [`Store::load`] to populate the
    /// index.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    fn skills_dir(&self) -> PathBuf {
        self.root.join("skills")
    }

    fn skill_dir(&self, name: &str) -> PathBuf {
        self.skills_dir().join(name)
    }

    /// Recursively rebuild the in-memory index by scanning `<root>/skills/`.
    /// Per-directory parse or validation failures are logged with `warn!`
    /// and skipped; they never abort the scan. A skill name seen more than
    /// once (across distinct directories) keeps the first encountered
    /// (directories are visited in sorted order) and warns on the rest.
    pub async fn load(&self) -> Result<()> {
        let skills_dir = self.skills_dir();
        if !skills_dir.exists() {
            tokio::fs::create_dir_all(&skills_dir).await?;
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&skills_dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        entries.sort();

        let mut loaded: HashMap<String, Skill> = HashMap::new();
        for dir_name in entries {
            let skill_path = self.skill_dir(&dir_name).join(SKILL_FILE);
            let content = match tokio::fs::read_to_string(&skill_path).await {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(path = %skill_path.display(), error = %err, "failed to read SKILL.md, skipping");
                    continue;
                }
            };

            if let Err(err) =
                security::validate_file_size(content.len(), security::MAX_SKILL_MD_SIZE, "SKILL.md")
            {
                warn!(path = %skill_path.display(), error = %err, "SKILL.md too large, skipping");
                continue;
            }

            let mut skill = match codec::decode(&content) {
                Ok(skill) => skill,
                Err(err) => {
                    warn!(path = %skill_path.display(), error = %err, "failed to parse SKILL.md, skipping");
                    continue;
                }
            };

            if skill.name != dir_name {
                if !skill.name.is_empty() {
                    warn!(
                        dir = %dir_name,
                        frontmatter_name = %skill.name,
                        "skill directory name disagrees with frontmatter name; directory wins"
                    );
                }
                skill.name = dir_name.clone();
            }
            skill.dir = dir_name.clone();
            skill.file_count = count_supporting_files(&self.skill_dir(&dir_name)).await;

            if loaded.contains_key(&skill.name) {
                warn!(name = %skill.name, dir = %dir_name, "duplicate skill name across directories, keeping the first loaded");
                continue;
            }
            loaded.insert(skill.name.clone(), skill);
        }

        let mut index = self.index.write().await;
        *index = loaded;
        Ok(())
    }

    /// Fetch a deep copy of the named skill.
    pub async fn get(&self, name: &str) -> Result<Skill> {
        let index = self.index.read().await;
        index
            .get(name)
            .cloned()
            .ok_or_else(|| SkillforgeError::SkillNotFound(name.to_string()))
    }

    /// List deep copies of every skill currently indexed.
    pub async fn list(&self) -> Vec<Skill> {
        let index = self.index.read().await;
        index.values().cloned().collect()
    }

    /// Validate and persist `skill`. Creates `skills/<name>/` if needed,
    /// renders `SKILL.md`, and writes it via a temp file + atomic rename.
    /// Any leftover `.tmp` file is removed on failure. Updates the index
    /// with a fresh copy on success.
    pub async fn save_skill(&self, mut skill: Skill) -> Result<()> {
        let report = validator::validate(&skill);
        if !report.is_ok() {
            return Err(SkillforgeError::Validation(report.errors));
        }
        security::validate_directory_name(&skill.name)?;

        let dir = self.skill_dir(&skill.name);
        tokio::fs::create_dir_all(&dir).await?;

        let rendered = codec::encode(&skill)?;
        let final_path = dir.join(SKILL_FILE);
        let tmp_path = dir.join(format!("{SKILL_FILE}.tmp"));

        let write_result = tokio::fs::write(&tmp_path, rendered.as_bytes()).await;
        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        skill.dir = skill.name.clone();
        skill.file_count = count_supporting_files(&dir).await;

        let mut index = self.index.write().await;
        index.insert(skill.name.clone(), skill);
        Ok(())
    }

    /// Recursively remove `skills/<name>/` and drop it from the index.
    /// Not an error if the skill is already absent.
    pub async fn delete_skill(&self, name: &str) -> Result<()> {
        let dir = self.skill_dir(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) | Err(_) if !dir.exists() => {}
            Err(err) => return Err(err.into()),
        }
        let mut index = self.index.write().await;
        index.remove(name);
        Ok(())
    }

    /// Rename a skill's directory and rewrite its frontmatter `name`.
    /// Rejects an invalid or already-taken `new_name`. Rolls back (reverses
    /// the directory rename) if rewriting `SKILL.md` fails.
    pub async fn rename_skill(&self, old_name: &str, new_name: &str) -> Result<()> {
        if !name::is_valid(new_name) {
            return Err(SkillforgeError::Validation(vec![format!(
                "invalid skill name '{new_name}'"
            )]));
        }
        security::validate_directory_name(new_name)?;
        {
            let index = self.index.read().await;
            if !index.contains_key(old_name) {
                return Err(SkillforgeError::SkillNotFound(old_name.to_string()));
            }
            if index.contains_key(new_name) {
                return Err(SkillforgeError::Validation(vec![format!(
                    "a skill named '{new_name}' already exists"
                )]));
            }
        }

        let old_dir = self.skill_dir(old_name);
        let new_dir = self.skill_dir(new_name);
        tokio::fs::rename(&old_dir, &new_dir).await?;

        let mut skill = match self.read_and_rename_frontmatter(&new_dir, new_name).await {
            Ok(skill) => skill,
            Err(err) => {
                let _ = tokio::fs::rename(&new_dir, &old_dir).await;
                return Err(err);
            }
        };
        skill.dir = new_name.to_string();
        skill.file_count = count_supporting_files(&new_dir).await;

        let mut index = self.index.write().await;
        index.remove(old_name);
        index.insert(new_name.to_string(), skill);
        Ok(())
    }

    async fn read_and_rename_frontmatter(&self, dir: &Path, new_name: &str) -> Result<Skill> {
        let path = dir.join(SKILL_FILE);
        let content = tokio::fs::read_to_string(&path).await?;
        let mut skill = codec::decode(&content)?;
        skill.name = new_name.to_string();
        let rendered = codec::encode(&skill)?;
        tokio::fs::write(&path, rendered.as_bytes()).await?;
        Ok(skill)
    }

    /// List relative file paths under a skill's directory, excluding
    /// `SKILL.md`, recursing through the supporting subtrees.
    pub async fn list_files(&self, skill_name: &str) -> Result<Vec<String>> {
        let dir = self.skill_dir(skill_name);
        if !dir.exists() {
            return Err(SkillforgeError::SkillNotFound(skill_name.to_string()));
        }
        let mut out = Vec::new();
        let mut stack = vec![PathBuf::new()];
        while let Some(relative) = stack.pop() {
            let absolute = dir.join(&relative);
            let mut read_dir = tokio::fs::read_dir(&absolute).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let entry_relative = relative.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    stack.push(entry_relative);
                } else if entry_relative != Path::new(SKILL_FILE) {
                    out.push(entry_relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Read the bytes of a file under a skill's directory, rejecting
    /// unsafe paths.
    pub async fn read_file(&self, skill_name: &str, path: &str) -> Result<Vec<u8>> {
        let resolved = safe_file_path(&self.skill_dir(skill_name), path)?;
        tokio::fs::read(&resolved)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    SkillforgeError::FileNotFound(path.to_string())
                }
                _ => SkillforgeError::Io(err),
            })
    }

    /// Write bytes to a file under a skill's directory, creating parent
    /// directories as needed, rejecting unsafe paths.
    pub async fn write_file(&self, skill_name: &str, path: &str, content: &[u8]) -> Result<()> {
        let resolved = safe_file_path(&self.skill_dir(skill_name), path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(())
    }

    /// Delete a file under a skill's directory, rejecting unsafe paths.
    pub async fn delete_file(&self, skill_name: &str, path: &str) -> Result<()> {
        let resolved = safe_file_path(&self.skill_dir(skill_name), path)?;
        tokio::fs::remove_file(&resolved).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => SkillforgeError::FileNotFound(path.to_string()),
            _ => SkillforgeError::Io(err),
        })
    }
}

/// Resolve a user-supplied relative path against a skill's directory,
/// rejecting absolute paths, any path containing a `..` segment, and any
/// lexically-resolved result that does not fall strictly under the skill
/// directory.
pub fn safe_file_path(skill_dir: &Path, user_path: &str) -> Result<PathBuf> {
    let candidate = Path::new(user_path);
    if candidate.is_absolute() {
        return Err(SkillforgeError::UnsafePath(format!(
            "path '{user_path}' is absolute"
        )));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SkillforgeError::UnsafePath(format!(
            "path '{user_path}' contains a '..' segment"
        )));
    }

    let normalized_dir = normalize(skill_dir);
    let normalized_candidate = normalize(&skill_dir.join(candidate));

    let boundary = format!("{}{}", normalized_dir.display(), std::path::MAIN_SEPARATOR);
    if normalized_candidate != normalized_dir
        && !normalized_candidate.display().to_string().starts_with(&boundary)
    {
        return Err(SkillforgeError::UnsafePath(format!(
            "path '{user_path}' escapes the skill directory"
        )));
    }

    Ok(normalized_candidate)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

async fn count_supporting_files(skill_dir: &Path) -> usize {
    let mut total = 0;
    for sub in SUPPORTING_DIRS {
        let Ok(mut read_dir) = tokio::fs::read_dir(skill_dir.join(sub)).await else {
            continue;
        };
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            if let Ok(file_type) = entry.file_type().await {
                if !file_type.is_dir() {
                    total += 1;
                }
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillforge_types::skill::{OnError, WorkflowStep};
    use std::collections::BTreeMap;

    async fn store_in_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.load().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn load_on_empty_root_yields_empty_index() {
        let (_dir, store) = store_in_tmp().await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn load_skips_oversized_skill_md() {
        let (dir, store) = store_in_tmp().await;
        let skill_dir = dir.path().join("skills/huge-skill");
        tokio::fs::create_dir_all(&skill_dir).await.unwrap();
        let oversized = format!(
            "---\nname: huge-skill\ndescription: {}\n---\nbody",
            "x".repeat(security::MAX_SKILL_MD_SIZE + 1)
        );
        tokio::fs::write(skill_dir.join("SKILL.md"), oversized)
            .await
            .unwrap();

        store.load().await.unwrap();
        assert!(store.get("huge-skill").await.is_err());
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let (_dir, store) = store_in_tmp().await;
        let skill = Skill::new("my-skill", "does a thing");
        store.save_skill(skill.clone()).await.unwrap();
        let fetched = store.get("my-skill").await.unwrap();
        assert_eq!(fetched.name, "my-skill");
        assert_eq!(fetched.description, "does a thing");
    }

    #[tokio::test]
    async fn save_rejects_invalid_skill() {
        let (_dir, store) = store_in_tmp().await;
        let skill = Skill::new("my-skill", "");
        let err = store.save_skill(skill).await.unwrap_err();
        assert!(matches!(err, SkillforgeError::Validation(_)));
    }

    #[tokio::test]
    async fn save_then_load_reflects_on_disk_state() {
        let (_dir, store) = store_in_tmp().await;
        store
            .save_skill(Skill::new("my-skill", "does a thing"))
            .await
            .unwrap();
        store.load().await.unwrap();
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn mutating_returned_copy_does_not_affect_store() {
        let (_dir, store) = store_in_tmp().await;
        store
            .save_skill(Skill::new("my-skill", "does a thing"))
            .await
            .unwrap();
        let mut fetched = store.get("my-skill").await.unwrap();
        fetched.description = "mutated".to_string();
        let refetched = store.get("my-skill").await.unwrap();
        assert_eq!(refetched.description, "does a thing");
    }

    #[tokio::test]
    async fn delete_skill_removes_directory_and_index_entry() {
        let (dir, store) = store_in_tmp().await;
        store
            .save_skill(Skill::new("my-skill", "does a thing"))
            .await
            .unwrap();
        store.delete_skill("my-skill").await.unwrap();
        assert!(store.get("my-skill").await.is_err());
        assert!(!dir.path().join("skills/my-skill").exists());
    }

    #[tokio::test]
    async fn delete_missing_skill_is_not_an_error() {
        let (_dir, store) = store_in_tmp().await;
        store.delete_skill("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn rename_skill_updates_directory_and_frontmatter() {
        let (dir, store) = store_in_tmp().await;
        store
            .save_skill(Skill::new("old-name", "does a thing"))
            .await
            .unwrap();
        store.rename_skill("old-name", "new-name").await.unwrap();
        assert!(store.get("old-name").await.is_err());
        let renamed = store.get("new-name").await.unwrap();
        assert_eq!(renamed.name, "new-name");
        assert!(!dir.path().join("skills/old-name").exists());
        let content =
            tokio::fs::read_to_string(dir.path().join("skills/new-name/SKILL.md"))
                .await
                .unwrap();
        assert!(content.contains("new-name"));
    }

    #[tokio::test]
    async fn rename_to_colliding_name_is_rejected() {
        let (_dir, store) = store_in_tmp().await;
        store.save_skill(Skill::new("a", "a skill")).await.unwrap();
        store.save_skill(Skill::new("b", "b skill")).await.unwrap();
        let err = store.rename_skill("a", "b").await.unwrap_err();
        assert!(matches!(err, SkillforgeError::Validation(_)));
    }

    #[tokio::test]
    async fn write_then_read_file_round_trips() {
        let (_dir, store) = store_in_tmp().await;
        store.save_skill(Skill::new("a", "a skill")).await.unwrap();
        store
            .write_file("a", "scripts/run.sh", b"#!/bin/sh\necho hi\n")
            .await
            .unwrap();
        let content = store.read_file("a", "scripts/run.sh").await.unwrap();
        assert_eq!(content, b"#!/bin/sh\necho hi\n");
    }

    #[tokio::test]
    async fn list_files_excludes_skill_md() {
        let (_dir, store) = store_in_tmp().await;
        store.save_skill(Skill::new("a", "a skill")).await.unwrap();
        store.write_file("a", "scripts/run.sh", b"x").await.unwrap();
        let files = store.list_files("a").await.unwrap();
        assert_eq!(files, vec!["scripts/run.sh".to_string()]);
    }

    #[tokio::test]
    async fn file_count_is_shallow_across_supporting_dirs() {
        let (_dir, store) = store_in_tmp().await;
        store.save_skill(Skill::new("a", "a skill")).await.unwrap();
        store.write_file("a", "scripts/run.sh", b"x").await.unwrap();
        store.write_file("a", "assets/img.png", b"x").await.unwrap();
        store
            .write_file("a", "scripts/nested/deep.sh", b"x")
            .await
            .unwrap();
        store.load().await.unwrap();
        let skill = store.get("a").await.unwrap();
        // Shallow count: run.sh + img.png; the nested/ directory and
        // anything under it are not counted.
        assert_eq!(skill.file_count, 2);
    }

    #[test]
    fn safe_path_rejects_absolute() {
        let dir = Path::new("/base/skills/a");
        assert!(safe_file_path(dir, "/etc/passwd").is_err());
    }

    #[test]
    fn safe_path_rejects_parent_traversal() {
        let dir = Path::new("/base/skills/a");
        assert!(safe_file_path(dir, "../../etc/passwd").is_err());
        assert!(safe_file_path(dir, "scripts/../../escape.txt").is_err());
    }

    #[test]
    fn safe_path_accepts_nested_relative_path() {
        let dir = Path::new("/base/skills/a");
        let resolved = safe_file_path(dir, "scripts/run.sh").unwrap();
        assert_eq!(resolved, Path::new("/base/skills/a/scripts/run.sh"));
    }

    #[test]
    fn dir_with_workflow_steps_round_trips_steps() {
        let mut skill = Skill::new("a", "a skill");
        skill.workflow = vec![WorkflowStep {
            id: "one".into(),
            tool: "srv__t".into(),
            args: BTreeMap::new(),
            depends_on: Vec::new(),
            condition: None,
            on_error: OnError::default(),
            timeout: None,
            retry: None,
        }];
        assert!(skill.is_executable());
    }
}
