use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How repository-declared commands are gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustMode {
    /// Run without prompting.
    Always,
    /// Never run; continuations still run.
    Never,
    /// Trust on first use.
    #[default]
    #[serde(alias = "tofu")]
    Ask,
}

/// Ordering of the worktree list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Path,
    /// Most recent commit first.
    Active,
    /// Most recently switched-to first.
    Switched,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            SortMode::Path => SortMode::Active,
            SortMode::Active => SortMode::Switched,
            SortMode::Switched => SortMode::Path,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Path => "path",
            SortMode::Active => "active",
            SortMode::Switched => "switched",
        }
    }
}

/// Strategy used when absorbing a worktree into the main branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Rebase,
    Merge,
}

impl MergeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMethod::Rebase => "rebase",
            MergeMethod::Merge => "merge",
        }
    }
}

pub mod paths {
    //! Path resolution for lwt configuration and data directories.
    //!
    //! LWT_HOME resolution order:
    //! 1. LWT_HOME environment variable (if set)
    //! 2. ~/.config/lwt (default)

    use std::path::PathBuf;

    fn home_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns the lwt home directory.
    pub fn lwt_home() -> PathBuf {
        if let Ok(home) = std::env::var("LWT_HOME") {
            return PathBuf::from(home);
        }
        home_dir().join(".config").join("lwt")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        lwt_home().join("config.toml")
    }

    /// Returns the path to the trust database.
    pub fn trust_path() -> PathBuf {
        lwt_home().join("trusted.json")
    }

    /// Returns the path to the log file.
    pub fn log_path() -> PathBuf {
        lwt_home().join("lwt.log")
    }

    /// Default parent directory for new worktrees.
    pub fn default_worktree_dir() -> PathBuf {
        home_dir().join(".local").join("share").join("worktrees")
    }

    /// Expands a leading `~` to the home directory.
    pub fn expand_home(path: &str) -> PathBuf {
        if path == "~" {
            return home_dir();
        }
        match path.strip_prefix("~/") {
            Some(rest) => home_dir().join(rest),
            None => PathBuf::from(path),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent directory for new worktrees (`~` is expanded)
    pub worktree_dir: Option<String>,

    /// Ordering of the worktree list
    pub sort_mode: SortMode,

    /// Refresh the worktree list periodically
    pub auto_refresh: bool,

    /// Seconds between periodic refreshes (minimum 1)
    pub refresh_interval_secs: u64,

    /// Gate for repository-declared commands: always, never or ask
    pub trust_mode: TrustMode,

    /// Commands run after a worktree is created
    pub init_commands: Vec<String>,

    /// Commands run before a worktree is removed
    pub terminate_commands: Vec<String>,

    /// Script that suggests branch names for PRs and issues
    pub branch_name_script: Option<String>,

    /// Absorb strategy: rebase or merge
    pub merge_method: MergeMethod,

    /// Log level used when LWT_LOG is unset
    pub log_level: String,
}

impl Config {
    const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;
    const DEFAULT_LOG_LEVEL: &str = "info";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template if no config exists yet.
    ///
    /// Returns `false` when a config file was already present.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::write_config(path, default_config_template())?;
        Ok(true)
    }

    /// Saves only the sort_mode field to a specific config file path.
    ///
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_sort_mode_to(path: &Path, mode: SortMode) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        doc["sort_mode"] = value(mode.as_str());

        Self::write_config(path, &doc.to_string())
    }

    /// Effective worktree parent directory.
    pub fn worktree_dir(&self) -> PathBuf {
        match self.worktree_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => paths::expand_home(dir),
            _ => paths::default_worktree_dir(),
        }
    }

    /// Periodic refresh interval, clamped to at least one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn branch_name_script(&self) -> Option<&str> {
        self.branch_name_script
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worktree_dir: None,
            sort_mode: SortMode::default(),
            auto_refresh: true,
            refresh_interval_secs: Self::DEFAULT_REFRESH_INTERVAL_SECS,
            trust_mode: TrustMode::default(),
            init_commands: Vec::new(),
            terminate_commands: Vec::new(),
            branch_name_script: None,
            merge_method: MergeMethod::default(),
            log_level: Self::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Commented template written by `lwt config init`.
pub fn default_config_template() -> &'static str {
    r#"# lwt configuration

# Parent directory for new worktrees
# worktree_dir = "~/.local/share/worktrees"

# Worktree list ordering: "path", "active" or "switched"
sort_mode = "path"

# Periodic refresh of the worktree list
auto_refresh = true
refresh_interval_secs = 10

# Repository-declared commands (.wt): "ask", "always" or "never"
trust_mode = "ask"

# Commands run after creating / before removing any worktree
init_commands = []
terminate_commands = []

# Script suggesting branch names for PRs and issues (reads title on stdin)
# branch_name_script = ""

# Absorb strategy: "rebase" or "merge"
merge_method = "rebase"

log_level = "info"
"#
}

// ============================================================================
// Repository config (.wt)
// ============================================================================

/// A command list that may be written as a single string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandList {
    One(String),
    Many(Vec<String>),
}

impl CommandList {
    fn into_commands(self) -> Vec<String> {
        let raw = match self {
            CommandList::One(cmd) => vec![cmd],
            CommandList::Many(cmds) => cmds,
        };
        raw.into_iter()
            .map(|cmd| cmd.trim().to_string())
            .filter(|cmd| !cmd.is_empty())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawRepoConfig {
    #[serde(default)]
    init_commands: Option<CommandList>,
    #[serde(default)]
    terminate_commands: Option<CommandList>,
}

/// Repository-declared commands read from `.wt` in the main worktree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoConfig {
    /// Path of the `.wt` file (the trust subject).
    pub path: PathBuf,
    pub init_commands: Vec<String>,
    pub terminate_commands: Vec<String>,
}

impl RepoConfig {
    pub const FILE_NAME: &str = ".wt";

    /// Loads `.wt` from the repository root.
    ///
    /// Returns `None` when the file doesn't exist.
    pub fn load(repo_root: &Path) -> Result<Option<Self>> {
        let path = repo_root.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: RawRepoConfig = if contents.trim().is_empty() {
            RawRepoConfig::default()
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };
        Ok(Some(Self {
            path,
            init_commands: raw
                .init_commands
                .map(CommandList::into_commands)
                .unwrap_or_default(),
            terminate_commands: raw
                .terminate_commands
                .map(CommandList::into_commands)
                .unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.trust_mode, TrustMode::Ask);
        assert_eq!(config.sort_mode, SortMode::Path);
        assert!(config.auto_refresh);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "trust_mode = \"tofu\"\ninit_commands = [\"make setup\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.trust_mode, TrustMode::Ask);
        assert_eq!(config.init_commands, vec!["make setup".to_string()]);
        assert_eq!(config.refresh_interval_secs, 10);
    }

    #[test]
    fn test_refresh_interval_is_clamped() {
        let config = Config {
            refresh_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_save_sort_mode_preserves_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "# keep me\nsort_mode = \"path\"\nauto_refresh = false\n").unwrap();

        Config::save_sort_mode_to(&path, SortMode::Switched).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# keep me"));
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sort_mode, SortMode::Switched);
        assert!(!config.auto_refresh);
    }

    #[test]
    fn test_init_writes_template_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        assert!(Config::init(&path).unwrap());
        assert!(!Config::init(&path).unwrap());
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.merge_method, MergeMethod::Rebase);
    }

    #[test]
    fn test_repo_config_accepts_string_or_list() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".wt"),
            "init_commands: npm install\nterminate_commands:\n  - echo bye\n  - \"\"\n",
        )
        .unwrap();

        let repo = RepoConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(repo.init_commands, vec!["npm install".to_string()]);
        assert_eq!(repo.terminate_commands, vec!["echo bye".to_string()]);
        assert_eq!(repo.path, dir.path().join(".wt"));
    }

    #[test]
    fn test_repo_config_missing_is_none() {
        let dir = tempdir().unwrap();
        assert!(RepoConfig::load(dir.path()).unwrap().is_none());
    }
}
