//! Execution of repository-declared shell commands.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::CommandError;

/// Worktree-scoped variables injected into every hook command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandEnv {
    vars: Vec<(String, String)>,
}

impl CommandEnv {
    /// Builds the standard variable set for a worktree.
    pub fn for_worktree(branch: &str, path: &Path, repo_name: &str, main_path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut env = Self::default();
        env.set("WORKTREE_BRANCH", branch);
        env.set("WORKTREE_PATH", path.display().to_string());
        env.set("WORKTREE_NAME", name);
        env.set("REPO_NAME", repo_name);
        env.set("MAIN_WORKTREE_PATH", main_path.display().to_string());
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A command batch bound to its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBatch {
    pub commands: Vec<String>,
    pub cwd: PathBuf,
    pub env: CommandEnv,
}

/// Runs `commands` in order through `bash -c`, stopping at the first failure.
///
/// The child inherits the process environment plus `env`.
///
/// # Errors
/// Returns `CommandError::Failed` with the combined output of the failing
/// command, or `CommandError::Spawn` if bash could not be started.
pub async fn execute_commands(
    commands: &[String],
    cwd: &Path,
    env: &CommandEnv,
) -> Result<(), CommandError> {
    for command in commands {
        let command = command.trim();
        if command.is_empty() {
            continue;
        }
        tracing::debug!(command, cwd = %cwd.display(), "running hook command");
        let output = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CommandError::Failed {
                command: command.to_string(),
                output: combined.trim().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_env_for_worktree() {
        let env = CommandEnv::for_worktree(
            "feature/x",
            Path::new("/wt/repo/feature-x"),
            "repo",
            Path::new("/src/repo"),
        );
        assert_eq!(env.get("WORKTREE_BRANCH"), Some("feature/x"));
        assert_eq!(env.get("WORKTREE_NAME"), Some("feature-x"));
        assert_eq!(env.get("MAIN_WORKTREE_PATH"), Some("/src/repo"));
    }

    #[test]
    fn test_env_set_overwrites() {
        let mut env = CommandEnv::default();
        env.set("A", "1");
        env.set("A", "2");
        assert_eq!(env.iter().count(), 1);
        assert_eq!(env.get("A"), Some("2"));
    }

    #[tokio::test]
    async fn test_execute_commands_uses_cwd_and_env() {
        let temp = TempDir::new().unwrap();
        let mut env = CommandEnv::default();
        env.set("WORKTREE_NAME", "demo");
        let commands = vec!["echo \"$WORKTREE_NAME\" > marker.txt".to_string()];

        execute_commands(&commands, temp.path(), &env).await.unwrap();

        let written = std::fs::read_to_string(temp.path().join("marker.txt")).unwrap();
        assert_eq!(written.trim(), "demo");
    }

    #[tokio::test]
    async fn test_execute_commands_stops_on_failure() {
        let temp = TempDir::new().unwrap();
        let commands = vec![
            "echo boom; exit 3".to_string(),
            "touch never.txt".to_string(),
        ];

        let err = execute_commands(&commands, temp.path(), &CommandEnv::default())
            .await
            .unwrap_err();

        let CommandError::Failed { command, output } = err else {
            panic!("expected a failed command");
        };
        assert_eq!(command, "echo boom; exit 3");
        assert_eq!(output.lines().last(), Some("boom"));
        assert!(!temp.path().join("never.txt").exists());
    }

    #[tokio::test]
    async fn test_execute_commands_skips_login_profile() {
        let temp = TempDir::new().unwrap();
        let commands = vec!["shopt -q login_shell && exit 9; echo ok".to_string()];

        execute_commands(&commands, temp.path(), &CommandEnv::default())
            .await
            .unwrap();
    }
}
