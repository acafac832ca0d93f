//! Per-repository session files (worktree cache, histories, last selection).
//!
//! Every save replaces the whole file through a temp file in the same
//! directory, so a crash never leaves a half-written file behind.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::WorktreeInfo;

const WORKTREE_CACHE_FILE: &str = ".worktree-cache.json";
const COMMAND_HISTORY_FILE: &str = ".command-history.json";
const ACCESS_HISTORY_FILE: &str = ".worktree-access.json";
const LAST_SELECTED_FILE: &str = ".last-selected";
const PALETTE_HISTORY_FILE: &str = ".palette-history.json";

/// Maximum retained shell commands.
pub const COMMAND_HISTORY_LIMIT: usize = 100;
/// Maximum retained palette entries.
pub const PALETTE_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorktreeCacheFile {
    #[serde(default)]
    worktrees: Vec<WorktreeInfo>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CommandHistoryFile {
    #[serde(default)]
    commands: Vec<String>,
}

/// How often and how recently a palette action was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteUsage {
    pub id: String,
    pub timestamp: i64,
    pub count: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PaletteHistoryFile {
    #[serde(default)]
    commands: Vec<PaletteUsage>,
}

/// Session files for one repository, stored under `<worktree_dir>/<repo_key>/`.
#[derive(Debug, Clone)]
pub struct RepoStore {
    dir: PathBuf,
}

impl RepoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_repo(worktree_dir: &Path, repo_key: &str) -> Self {
        Self::new(worktree_dir.join(repo_key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_worktree_cache(&self) -> Result<Vec<WorktreeInfo>> {
        let file: WorktreeCacheFile = self.read_json(WORKTREE_CACHE_FILE)?;
        Ok(file.worktrees)
    }

    pub fn save_worktree_cache(&self, worktrees: &[WorktreeInfo]) -> Result<()> {
        let file = WorktreeCacheFile {
            worktrees: worktrees.to_vec(),
        };
        self.write_json(WORKTREE_CACHE_FILE, &file)
    }

    /// Newest first.
    pub fn load_command_history(&self) -> Result<Vec<String>> {
        let file: CommandHistoryFile = self.read_json(COMMAND_HISTORY_FILE)?;
        Ok(file.commands)
    }

    /// Moves `command` to the front of the history and returns the new list.
    pub fn push_command_history(&self, command: &str) -> Result<Vec<String>> {
        let command = command.trim();
        let mut commands = self.load_command_history().unwrap_or_default();
        if command.is_empty() {
            return Ok(commands);
        }
        commands.retain(|c| c != command);
        commands.insert(0, command.to_string());
        commands.truncate(COMMAND_HISTORY_LIMIT);
        self.write_json(
            COMMAND_HISTORY_FILE,
            &CommandHistoryFile {
                commands: commands.clone(),
            },
        )?;
        Ok(commands)
    }

    /// Worktree path to unix seconds of the last switch.
    pub fn load_access_history(&self) -> Result<HashMap<String, i64>> {
        self.read_json(ACCESS_HISTORY_FILE)
    }

    pub fn save_access_history(&self, history: &HashMap<String, i64>) -> Result<()> {
        self.write_json(ACCESS_HISTORY_FILE, history)
    }

    pub fn load_last_selected(&self) -> Result<Option<PathBuf>> {
        let path = self.dir.join(LAST_SELECTED_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn save_last_selected(&self, selected: &Path) -> Result<()> {
        let contents = format!("{}\n", selected.display());
        write_atomic(&self.dir.join(LAST_SELECTED_FILE), contents.as_bytes())
    }

    /// Most recently used first.
    pub fn load_palette_history(&self) -> Result<Vec<PaletteUsage>> {
        let file: PaletteHistoryFile = self.read_json(PALETTE_HISTORY_FILE)?;
        Ok(file.commands)
    }

    pub fn record_palette_use(&self, id: &str, now: i64) -> Result<Vec<PaletteUsage>> {
        let mut commands = self.load_palette_history().unwrap_or_default();
        let count = match commands.iter().position(|u| u.id == id) {
            Some(idx) => commands.remove(idx).count + 1,
            None => 1,
        };
        commands.insert(
            0,
            PaletteUsage {
                id: id.to_string(),
                timestamp: now,
                count,
            },
        );
        commands.truncate(PALETTE_HISTORY_LIMIT);
        self.write_json(
            PALETTE_HISTORY_FILE,
            &PaletteHistoryFile {
                commands: commands.clone(),
            },
        )?;
        Ok(commands)
    }

    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("serialize session file")?;
        write_atomic(&self.dir.join(name), json.as_bytes())
    }
}

/// Replaces `path` with `contents` via a temp file and rename.
///
/// # Errors
/// Returns an error if the directory cannot be created or the write fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    create_private_dir(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Creates `dir` (and parents) with mode 0750 on unix.
pub fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder
        .create(dir)
        .with_context(|| format!("create directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, RepoStore) {
        let temp = TempDir::new().unwrap();
        let store = RepoStore::for_repo(temp.path(), "local-deadbeef");
        (temp, store)
    }

    #[test]
    fn test_missing_files_load_as_empty() {
        let (_temp, store) = store();
        assert!(store.load_worktree_cache().unwrap().is_empty());
        assert!(store.load_command_history().unwrap().is_empty());
        assert!(store.load_access_history().unwrap().is_empty());
        assert_eq!(store.load_last_selected().unwrap(), None);
    }

    #[test]
    fn test_worktree_cache_persists() {
        let (_temp, store) = store();
        let mut wt = WorktreeInfo::new("/wt/a", "feature-a");
        wt.ahead = 2;
        store.save_worktree_cache(std::slice::from_ref(&wt)).unwrap();

        assert_eq!(store.load_worktree_cache().unwrap(), vec![wt]);
        assert!(store.dir().join(WORKTREE_CACHE_FILE).exists());
    }

    #[test]
    fn test_command_history_dedups_newest_first() {
        let (_temp, store) = store();
        store.push_command_history("make test").unwrap();
        store.push_command_history("git fetch").unwrap();
        let history = store.push_command_history("make test").unwrap();
        assert_eq!(history, vec!["make test", "git fetch"]);
        assert_eq!(store.load_command_history().unwrap(), history);
    }

    #[test]
    fn test_command_history_is_capped() {
        let (_temp, store) = store();
        for i in 0..(COMMAND_HISTORY_LIMIT + 5) {
            store.push_command_history(&format!("cmd {i}")).unwrap();
        }
        let history = store.load_command_history().unwrap();
        assert_eq!(history.len(), COMMAND_HISTORY_LIMIT);
        assert_eq!(history[0], format!("cmd {}", COMMAND_HISTORY_LIMIT + 4));
    }

    #[test]
    fn test_palette_history_counts_uses() {
        let (_temp, store) = store();
        store.record_palette_use("refresh", 10).unwrap();
        store.record_palette_use("create", 11).unwrap();
        let history = store.record_palette_use("refresh", 12).unwrap();
        assert_eq!(history[0].id, "refresh");
        assert_eq!(history[0].count, 2);
        assert_eq!(history[0].timestamp, 12);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_last_selected_roundtrip() {
        let (_temp, store) = store();
        store.save_last_selected(Path::new("/wt/b")).unwrap();
        assert_eq!(
            store.load_last_selected().unwrap(),
            Some(PathBuf::from("/wt/b"))
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_temp, store) = store();
        create_private_dir(store.dir()).unwrap();
        fs::write(store.dir().join(COMMAND_HISTORY_FILE), "{not json").unwrap();
        assert!(store.load_command_history().is_err());
    }
}
