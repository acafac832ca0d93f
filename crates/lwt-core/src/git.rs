//! Repository service: git and gh subprocess calls.
//!
//! The TUI talks to the repository only through [`RepositoryService`], so the
//! engine can be driven by an in-memory fake in tests.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::commands::{CommandEnv, execute_commands};
use crate::config::MergeMethod;
use crate::error::CommandError;
use crate::models::{
    CommitFile, DETACHED, Issue, PullRequest, WorktreeInfo, parse_branch_activity,
    parse_branch_status, parse_name_status, parse_worktree_list,
};

/// Boxed future returned by every service method.
pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Commits considered for the unpushed and unmerged markers.
pub const COMMIT_SET_LIMIT: usize = 100;

/// Commits shown in the log pane.
pub const LOG_LIMIT: usize = 50;

/// Where the repository lives and how its session files are keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    /// Top level of the worktree the session was started in.
    pub toplevel: PathBuf,
    /// Shared `.git` directory of all worktrees.
    pub common_dir: PathBuf,
    pub repo_name: String,
    /// Directory key under `worktree_dir` (`owner/repo` or `local-<hash>`).
    pub repo_key: String,
}

/// Three-part diff of a worktree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeDiff {
    pub staged: String,
    pub unstaged: String,
    pub untracked: Vec<String>,
}

impl WorktreeDiff {
    pub fn is_empty(&self) -> bool {
        self.staged.trim().is_empty() && self.unstaged.trim().is_empty() && self.untracked.is_empty()
    }

    /// Renders the sections with headers, skipping empty ones.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.staged.trim().is_empty() {
            parts.push(format!("=== Staged Changes ===\n{}", self.staged.trim_end()));
        }
        if !self.unstaged.trim().is_empty() {
            parts.push(format!(
                "=== Unstaged Changes ===\n{}",
                self.unstaged.trim_end()
            ));
        }
        if !self.untracked.is_empty() {
            parts.push(format!(
                "=== Untracked Files ===\n{}",
                self.untracked.join("\n")
            ));
        }
        if parts.is_empty() {
            return "No changes.".to_string();
        }
        parts.join("\n\n")
    }

    /// Only the sections of the diff that touch `file`.
    pub fn for_file(&self, file: &str) -> Self {
        Self {
            staged: file_sections(&self.staged, file),
            unstaged: file_sections(&self.unstaged, file),
            untracked: self
                .untracked
                .iter()
                .filter(|f| *f == file)
                .cloned()
                .collect(),
        }
    }

    /// Only the staged part.
    pub fn staged_only(&self) -> Self {
        Self {
            staged: self.staged.clone(),
            ..Self::default()
        }
    }
}

/// Keeps the `diff --git` blocks of a unified diff whose target is `file`.
fn file_sections(diff: &str, file: &str) -> String {
    let target = format!(" b/{file}");
    let mut out = String::new();
    let mut keep = false;
    for line in diff.lines() {
        if line.starts_with("diff --git ") {
            keep = line.ends_with(&target);
        }
        if keep {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Where a push or sync goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub remote: String,
    pub branch: String,
    /// Record the target as the branch's upstream (`push -u`).
    pub set_upstream: bool,
}

impl UpstreamTarget {
    fn push_args(&self) -> Vec<String> {
        let mut args = vec!["push".to_string()];
        if self.set_upstream {
            args.push("-u".to_string());
        }
        args.push(self.remote.clone());
        args.push(format!("HEAD:{}", self.branch));
        args
    }

    fn pull_args(&self, method: MergeMethod) -> Vec<String> {
        let mut args = vec![
            "pull".to_string(),
            self.remote.clone(),
            self.branch.clone(),
        ];
        match method {
            MergeMethod::Rebase => args.push("--rebase".to_string()),
            MergeMethod::Merge => args.push("--no-rebase".to_string()),
        }
        args
    }
}

/// Queries and commands against the repository's worktrees.
pub trait RepositoryService: Send + Sync {
    fn context(&self) -> &RepoContext;

    fn list_worktrees(&self) -> RepoFuture<'_, Vec<WorktreeInfo>>;
    /// Raw `git status --porcelain=v2 --branch` output.
    fn status_snapshot<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, String>;
    /// Raw tab-separated log (`sha`, author, subject).
    fn log_snapshot<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, String>;
    fn unpushed_commits<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, HashSet<String>>;
    fn unmerged_commits<'a>(
        &'a self,
        path: &'a Path,
        main_branch: &'a str,
    ) -> RepoFuture<'a, HashSet<String>>;
    fn execute_commands<'a>(
        &'a self,
        commands: &'a [String],
        cwd: &'a Path,
        env: &'a CommandEnv,
    ) -> RepoFuture<'a, ()>;

    fn main_branch(&self) -> RepoFuture<'_, String>;
    fn branches(&self) -> RepoFuture<'_, Vec<String>>;
    fn branch_exists<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, bool>;
    fn merged_branches<'a>(&'a self, base: &'a str) -> RepoFuture<'a, Vec<String>>;
    fn diff<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, WorktreeDiff>;
    fn commit_files<'a>(&'a self, path: &'a Path, sha: &'a str)
    -> RepoFuture<'a, Vec<CommitFile>>;
    fn commit_file_diff<'a>(
        &'a self,
        path: &'a Path,
        sha: &'a str,
        file: &'a str,
    ) -> RepoFuture<'a, String>;
    fn pull_requests(&self) -> RepoFuture<'_, Vec<PullRequest>>;
    fn issues(&self) -> RepoFuture<'_, Vec<Issue>>;

    fn create_worktree<'a>(
        &'a self,
        branch: &'a str,
        target: &'a Path,
        base: &'a str,
    ) -> RepoFuture<'a, ()>;
    fn create_worktree_from_pr<'a>(
        &'a self,
        pr: &'a PullRequest,
        branch: &'a str,
        target: &'a Path,
    ) -> RepoFuture<'a, ()>;
    fn remove_worktree<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, ()>;
    fn delete_branch<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, ()>;
    fn rename_worktree<'a>(
        &'a self,
        old_path: &'a Path,
        new_path: &'a Path,
        old_branch: &'a str,
        new_branch: &'a str,
    ) -> RepoFuture<'a, ()>;
    fn absorb_worktree<'a>(
        &'a self,
        worktree: &'a WorktreeInfo,
        main_path: &'a Path,
        main_branch: &'a str,
        method: MergeMethod,
    ) -> RepoFuture<'a, ()>;
    fn prune_metadata(&self) -> RepoFuture<'_, ()>;
    /// Pushes `HEAD` to `remote/branch`, recording it as upstream when
    /// `set_upstream` is set. Returns git's combined output.
    fn push_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
    ) -> RepoFuture<'a, String>;
    /// Pulls `remote/branch` (rebasing or merging per `method`), then pushes
    /// as [`RepositoryService::push_branch`] does.
    fn sync_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
        method: MergeMethod,
    ) -> RepoFuture<'a, String>;

    fn stage_file<'a>(&'a self, path: &'a Path, file: &'a str) -> RepoFuture<'a, ()>;
    fn unstage_file<'a>(&'a self, path: &'a Path, file: &'a str) -> RepoFuture<'a, ()>;
    fn restore_file<'a>(
        &'a self,
        path: &'a Path,
        file: &'a str,
        untracked: bool,
    ) -> RepoFuture<'a, ()>;
    fn commit<'a>(&'a self, path: &'a Path, message: &'a str) -> RepoFuture<'a, ()>;
    /// Runs a user command in the worktree and returns its combined output.
    fn run_shell<'a>(&'a self, path: &'a Path, command: &'a str) -> RepoFuture<'a, String>;
}

/// [`RepositoryService`] backed by the `git` and `gh` binaries.
#[derive(Debug, Clone)]
pub struct GitService {
    ctx: RepoContext,
}

impl GitService {
    pub fn new(ctx: RepoContext) -> Self {
        Self { ctx }
    }

    /// Resolves the repository containing `dir`.
    ///
    /// # Errors
    /// Returns an error if `dir` is not inside a git repository.
    pub async fn discover(dir: &Path) -> Result<Self> {
        let toplevel = run_git(dir, &["rev-parse", "--show-toplevel"])
            .await
            .with_context(|| format!("{} is not inside a git repository", dir.display()))?;
        let toplevel = PathBuf::from(toplevel.trim());
        if toplevel.as_os_str().is_empty() {
            bail!("git rev-parse returned empty repo root");
        }

        let common = run_git(&toplevel, &["rev-parse", "--git-common-dir"]).await?;
        let common = PathBuf::from(common.trim());
        let common_dir = if common.is_absolute() {
            common
        } else {
            toplevel.join(common)
        };

        let remote = run_git(&toplevel, &["remote", "get-url", "origin"])
            .await
            .ok();
        let (repo_name, repo_key) = repo_identity(&common_dir, &toplevel, remote.as_deref());

        tracing::info!(
            toplevel = %toplevel.display(),
            repo_key = %repo_key,
            "resolved repository"
        );
        Ok(Self::new(RepoContext {
            toplevel,
            common_dir,
            repo_name,
            repo_key,
        }))
    }

    fn root(&self) -> &Path {
        &self.ctx.toplevel
    }

    async fn collect_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        let raw = run_git(self.root(), &["worktree", "list", "--porcelain"]).await?;
        let entries = parse_worktree_list(&raw);

        let activity = run_git(
            self.root(),
            &[
                "for-each-ref",
                "--format=%(refname:short)|%(committerdate:unix)",
                "refs/heads",
            ],
        )
        .await
        .map(|raw| parse_branch_activity(&raw))
        .unwrap_or_default();

        let mut statuses = JoinSet::new();
        for (idx, entry) in entries.iter().enumerate() {
            let path = entry.path.clone();
            statuses.spawn(async move {
                let raw = run_git(&path, &["status", "--porcelain=v2", "--branch"]).await;
                (idx, raw)
            });
        }
        let mut raw_statuses = vec![None; entries.len()];
        while let Some(joined) = statuses.join_next().await {
            let (idx, raw) = joined.context("status task panicked")?;
            match raw {
                Ok(raw) => raw_statuses[idx] = Some(raw),
                Err(e) => tracing::warn!("worktree status failed: {e:#}"),
            }
        }

        let worktrees = entries
            .into_iter()
            .zip(raw_statuses)
            .enumerate()
            .map(|(idx, (entry, raw))| {
                let branch = entry.branch.unwrap_or_else(|| DETACHED.to_string());
                let mut wt = WorktreeInfo::new(entry.path, branch);
                wt.is_main = idx == 0;
                wt.last_active_ts = activity.get(&wt.branch).copied().unwrap_or_default();
                if let Some(raw) = raw {
                    let status = parse_branch_status(&raw);
                    wt.ahead = status.ahead;
                    wt.behind = status.behind;
                    wt.has_upstream = status.has_upstream;
                    wt.upstream = status.upstream;
                    wt.untracked = status.counts.untracked;
                    wt.modified = status.counts.modified;
                    wt.staged = status.counts.staged;
                    wt.dirty = !status.counts.is_clean();
                }
                wt
            })
            .collect();
        Ok(worktrees)
    }

    async fn rev_list(&self, path: &Path, range: &[&str]) -> Result<HashSet<String>> {
        let limit = format!("-{COMMIT_SET_LIMIT}");
        let mut args = vec!["rev-list", limit.as_str()];
        args.extend_from_slice(range);
        let raw = run_git(path, &args).await?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl RepositoryService for GitService {
    fn context(&self) -> &RepoContext {
        &self.ctx
    }

    fn list_worktrees(&self) -> RepoFuture<'_, Vec<WorktreeInfo>> {
        Box::pin(self.collect_worktrees())
    }

    fn status_snapshot<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, String> {
        Box::pin(run_git(path, &["status", "--porcelain=v2", "--branch"]))
    }

    fn log_snapshot<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, String> {
        Box::pin(async move {
            let limit = format!("-{LOG_LIMIT}");
            run_git(
                path,
                &["log", limit.as_str(), "--pretty=format:%H%x09%an%x09%s"],
            )
            .await
        })
    }

    fn unpushed_commits<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, HashSet<String>> {
        Box::pin(self.rev_list(path, &["HEAD", "--not", "--remotes"]))
    }

    fn unmerged_commits<'a>(
        &'a self,
        path: &'a Path,
        main_branch: &'a str,
    ) -> RepoFuture<'a, HashSet<String>> {
        Box::pin(async move {
            let exclude = format!("^{main_branch}");
            self.rev_list(path, &["HEAD", exclude.as_str()]).await
        })
    }

    fn execute_commands<'a>(
        &'a self,
        commands: &'a [String],
        cwd: &'a Path,
        env: &'a CommandEnv,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move { Ok(execute_commands(commands, cwd, env).await?) })
    }

    fn main_branch(&self) -> RepoFuture<'_, String> {
        Box::pin(async move {
            let head = run_git(
                self.root(),
                &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
            )
            .await
            .unwrap_or_default();
            Ok(main_branch_from_ref(&head))
        })
    }

    fn branches(&self) -> RepoFuture<'_, Vec<String>> {
        Box::pin(async move {
            let raw = run_git(
                self.root(),
                &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
            )
            .await?;
            Ok(raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect())
        })
    }

    fn branch_exists<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, bool> {
        Box::pin(async move {
            let ref_name = format!("refs/heads/{branch}");
            let status = Command::new("git")
                .arg("-C")
                .arg(self.root())
                .args(["show-ref", "--verify", "--quiet", ref_name.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .context("git show-ref")?;
            Ok(status.success())
        })
    }

    fn merged_branches<'a>(&'a self, base: &'a str) -> RepoFuture<'a, Vec<String>> {
        Box::pin(async move {
            let raw = run_git(self.root(), &["branch", "--merged", base]).await?;
            Ok(parse_merged_branches(&raw))
        })
    }

    fn diff<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, WorktreeDiff> {
        Box::pin(async move {
            let staged = run_git(path, &["diff", "--cached", "--patch", "--no-color"]).await?;
            let unstaged = run_git(path, &["diff", "--patch", "--no-color"]).await?;
            let untracked = run_git(path, &["ls-files", "--others", "--exclude-standard"])
                .await?
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            Ok(WorktreeDiff {
                staged,
                unstaged,
                untracked,
            })
        })
    }

    fn commit_files<'a>(
        &'a self,
        path: &'a Path,
        sha: &'a str,
    ) -> RepoFuture<'a, Vec<CommitFile>> {
        Box::pin(async move {
            let raw = run_git(
                path,
                &["show", "--name-status", "--pretty=format:", "--no-color", sha],
            )
            .await?;
            Ok(parse_name_status(&raw))
        })
    }

    fn commit_file_diff<'a>(
        &'a self,
        path: &'a Path,
        sha: &'a str,
        file: &'a str,
    ) -> RepoFuture<'a, String> {
        Box::pin(async move {
            run_git(
                path,
                &["show", "--patch", "--pretty=format:", "--no-color", sha, "--", file],
            )
            .await
        })
    }

    fn pull_requests(&self) -> RepoFuture<'_, Vec<PullRequest>> {
        Box::pin(async move {
            let raw = run_tool(
                "gh",
                self.root(),
                &[
                    "pr",
                    "list",
                    "--state",
                    "open",
                    "--json",
                    "number,title,headRefName,body",
                    "--limit",
                    "100",
                ],
            )
            .await?;
            serde_json::from_str(&raw).context("parse gh pr list output")
        })
    }

    fn issues(&self) -> RepoFuture<'_, Vec<Issue>> {
        Box::pin(async move {
            let raw = run_tool(
                "gh",
                self.root(),
                &[
                    "issue", "list", "--state", "open", "--json", "number,title,body", "--limit",
                    "100",
                ],
            )
            .await?;
            serde_json::from_str(&raw).context("parse gh issue list output")
        })
    }

    fn create_worktree<'a>(
        &'a self,
        branch: &'a str,
        target: &'a Path,
        base: &'a str,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            if let Some(parent) = target.parent() {
                crate::persistence::create_private_dir(parent)?;
            }
            let target = target.to_string_lossy();
            run_git(
                self.root(),
                &["worktree", "add", "-b", branch, target.as_ref(), base],
            )
            .await?;
            Ok(())
        })
    }

    fn create_worktree_from_pr<'a>(
        &'a self,
        pr: &'a PullRequest,
        branch: &'a str,
        target: &'a Path,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            run_git(self.root(), &["fetch", "origin", pr.head_ref_name.as_str()])
                .await
                .with_context(|| format!("fetch PR #{} branch", pr.number))?;
            let remote_ref = format!("origin/{}", pr.head_ref_name);
            self.create_worktree(branch, target, &remote_ref).await
        })
    }

    fn remove_worktree<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            let path = path.to_string_lossy();
            run_git(
                self.root(),
                &["worktree", "remove", "--force", path.as_ref()],
            )
            .await?;
            Ok(())
        })
    }

    fn delete_branch<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            run_git(self.root(), &["branch", "-D", branch]).await?;
            Ok(())
        })
    }

    fn rename_worktree<'a>(
        &'a self,
        old_path: &'a Path,
        new_path: &'a Path,
        old_branch: &'a str,
        new_branch: &'a str,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            let old = old_path.to_string_lossy();
            let new = new_path.to_string_lossy();
            run_git(
                self.root(),
                &["worktree", "move", old.as_ref(), new.as_ref()],
            )
            .await?;
            run_git(new_path, &["branch", "-m", old_branch, new_branch]).await?;
            Ok(())
        })
    }

    fn absorb_worktree<'a>(
        &'a self,
        worktree: &'a WorktreeInfo,
        main_path: &'a Path,
        main_branch: &'a str,
        method: MergeMethod,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            let branch = worktree.branch.as_str();
            match method {
                MergeMethod::Rebase => {
                    run_git(&worktree.path, &["rebase", main_branch])
                        .await
                        .with_context(|| {
                            format!(
                                "rebase failed; resolve conflicts in {} and retry",
                                worktree.path.display()
                            )
                        })?;
                    run_git(main_path, &["merge", "--ff-only", branch])
                        .await
                        .context("fast-forward failed; the branch may have diverged")?;
                }
                MergeMethod::Merge => {
                    run_git(main_path, &["merge", "--no-edit", branch])
                        .await
                        .with_context(|| {
                            format!(
                                "merge failed; resolve conflicts in {} and retry",
                                main_path.display()
                            )
                        })?;
                }
            }
            Ok(())
        })
    }

    fn prune_metadata(&self) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            run_git(self.root(), &["worktree", "prune"]).await?;
            Ok(())
        })
    }

    fn push_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
    ) -> RepoFuture<'a, String> {
        Box::pin(async move {
            let args = target.push_args();
            run_git_combined(path, &args).await.context("push failed")
        })
    }

    fn sync_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
        method: MergeMethod,
    ) -> RepoFuture<'a, String> {
        Box::pin(async move {
            let pulled = run_git_combined(path, &target.pull_args(method))
                .await
                .context("pull failed")?;
            let pushed = run_git_combined(path, &target.push_args())
                .await
                .context("push failed")?;
            let combined: Vec<&str> = [pulled.trim(), pushed.trim()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();
            Ok(combined.join("\n"))
        })
    }

    fn stage_file<'a>(&'a self, path: &'a Path, file: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            run_git(path, &["add", "--", file]).await?;
            Ok(())
        })
    }

    fn unstage_file<'a>(&'a self, path: &'a Path, file: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            run_git(path, &["restore", "--staged", "--", file]).await?;
            Ok(())
        })
    }

    fn restore_file<'a>(
        &'a self,
        path: &'a Path,
        file: &'a str,
        untracked: bool,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            if untracked {
                run_git(path, &["clean", "-f", "--", file]).await?;
            } else {
                run_git(
                    path,
                    &["restore", "--source=HEAD", "--staged", "--worktree", "--", file],
                )
                .await?;
            }
            Ok(())
        })
    }

    fn commit<'a>(&'a self, path: &'a Path, message: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            run_git(path, &["commit", "-m", message]).await?;
            Ok(())
        })
    }

    fn run_shell<'a>(&'a self, path: &'a Path, command: &'a str) -> RepoFuture<'a, String> {
        Box::pin(async move {
            let output = Command::new("bash")
                .arg("-lc")
                .arg(command)
                .current_dir(path)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|source| CommandError::Spawn {
                    command: command.to_string(),
                    source,
                })?;
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            if !output.status.success() {
                return Err(CommandError::Failed {
                    command: command.to_string(),
                    output: combined.trim().to_string(),
                }
                .into());
            }
            Ok(combined)
        })
    }
}

/// Runs `git -C <cwd> <args>` and returns stdout.
async fn run_git(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(args)
        // Read-only queries must not rewrite the index; the metadata
        // watcher would see that as a change.
        .env("GIT_OPTIONAL_LOCKS", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: format!("git {}", args.join(" ")),
            source,
        })?;
    if !output.status.success() {
        return Err(CommandError::Failed {
            command: format!("git {}", args.join(" ")),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a git command that talks to a remote and returns stdout and stderr
/// together; push and pull report progress on stderr.
async fn run_git_combined(cwd: &Path, args: &[String]) -> Result<String> {
    let command = format!("git {}", args.join(" "));
    tracing::debug!(%command, cwd = %cwd.display(), "running remote git command");
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(args)
        // The TUI owns the terminal, so credential prompts would hang.
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(CommandError::Failed {
            command,
            output: combined.trim().to_string(),
        }
        .into());
    }
    Ok(combined)
}

async fn run_tool(program: &str, cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(CommandError::Failed {
            command: format!("{program} {}", args.join(" ")),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Last segment of `origin/HEAD`'s target, or `main` when unset.
pub fn main_branch_from_ref(head: &str) -> String {
    head.trim()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("main")
        .to_string()
}

/// Parses `git branch --merged`, dropping the current (`*`) and
/// checked-out-elsewhere (`+`) markers.
pub fn parse_merged_branches(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("* ")
                .trim_start_matches("+ ")
                .trim()
        })
        .filter(|b| !b.is_empty() && !b.starts_with('('))
        .map(str::to_string)
        .collect()
}

/// Derives the repo name and session key from the origin URL, or hashes the
/// common dir for repositories without a remote.
pub fn repo_identity(common_dir: &Path, toplevel: &Path, remote: Option<&str>) -> (String, String) {
    if let Some(slug) = remote.and_then(remote_slug) {
        let name = slug.rsplit('/').next().unwrap_or(&slug).to_string();
        return (name, slug);
    }
    let anchor = common_dir
        .parent()
        .filter(|_| common_dir.ends_with(".git"))
        .unwrap_or(toplevel);
    let name = anchor
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string());
    let digest = Sha256::digest(anchor.to_string_lossy().as_bytes());
    let hash: String = format!("{digest:x}").chars().take(8).collect();
    (name, format!("local-{hash}"))
}

/// `owner/repo` from an ssh or https remote URL.
fn remote_slug(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/').trim_end_matches(".git");
    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p)?,
        None => trimmed.split_once(':').map(|(_, p)| p)?,
    };
    let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
    let repo = segments.next()?;
    match segments.next() {
        Some(owner) => Some(format!("{owner}/{repo}")),
        None => Some(repo.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command as StdCommand;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_main_branch_from_ref() {
        assert_eq!(main_branch_from_ref("origin/develop\n"), "develop");
        assert_eq!(main_branch_from_ref(""), "main");
    }

    #[test]
    fn test_parse_merged_branches_strips_markers() {
        let raw = "* main\n+ feature-a\n  feature-b\n  (HEAD detached at abc)\n";
        assert_eq!(
            parse_merged_branches(raw),
            vec!["main", "feature-a", "feature-b"]
        );
    }

    #[test]
    fn test_repo_identity_from_remote() {
        let (name, key) = repo_identity(
            Path::new("/src/app/.git"),
            Path::new("/src/app"),
            Some("git@github.com:acme/app.git"),
        );
        assert_eq!(name, "app");
        assert_eq!(key, "acme/app");

        let (_, key) = repo_identity(
            Path::new("/x/.git"),
            Path::new("/x"),
            Some("https://github.com/acme/tool"),
        );
        assert_eq!(key, "acme/tool");
    }

    #[test]
    fn test_repo_identity_local_hash_is_stable() {
        let a = repo_identity(Path::new("/src/app/.git"), Path::new("/src/app"), None);
        let b = repo_identity(Path::new("/src/app/.git"), Path::new("/src/app"), None);
        assert_eq!(a, b);
        assert_eq!(a.0, "app");
        assert!(a.1.starts_with("local-"));
        assert_eq!(a.1.len(), "local-".len() + 8);
    }

    #[test]
    fn test_worktree_diff_render() {
        let diff = WorktreeDiff {
            staged: "+a\n".to_string(),
            unstaged: String::new(),
            untracked: vec!["new.txt".to_string()],
        };
        let rendered = diff.render();
        assert!(rendered.contains("=== Staged Changes ==="));
        assert!(!rendered.contains("Unstaged"));
        assert!(rendered.contains("new.txt"));
        assert_eq!(WorktreeDiff::default().render(), "No changes.");
    }

    #[test]
    fn test_worktree_diff_for_file() {
        let diff = WorktreeDiff {
            staged: "diff --git a/src/a.rs b/src/a.rs\n+a\ndiff --git a/src/b.rs b/src/b.rs\n+b\n"
                .to_string(),
            unstaged: "diff --git a/src/b.rs b/src/b.rs\n-b\n".to_string(),
            untracked: vec!["new.txt".to_string()],
        };
        let only_a = diff.for_file("src/a.rs");
        assert_eq!(only_a.staged, "diff --git a/src/a.rs b/src/a.rs\n+a\n");
        assert!(only_a.unstaged.is_empty());
        assert!(only_a.untracked.is_empty());

        let only_b = diff.for_file("src/b.rs");
        assert!(only_b.staged.contains("+b"));
        assert!(only_b.unstaged.contains("-b"));
        assert_eq!(diff.for_file("new.txt").untracked, vec!["new.txt".to_string()]);
        assert!(diff.staged_only().unstaged.is_empty());
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        git(&repo, &["init", "-q", "-b", "main"]);
        git(&repo, &["config", "user.email", "lwt@example.com"]);
        git(&repo, &["config", "user.name", "lwt"]);
        std::fs::write(repo.join("README.md"), "hello\n").unwrap();
        git(&repo, &["add", "README.md"]);
        git(&repo, &["commit", "-q", "-m", "Initial commit"]);
        temp
    }

    #[tokio::test]
    async fn test_create_list_and_remove_worktree() {
        let temp = init_repo();
        let repo = temp.path().join("repo");
        let service = GitService::discover(&repo).await.unwrap();
        assert_eq!(service.context().repo_name, "repo");

        let target = temp.path().join("wts").join("feature");
        service
            .create_worktree("feature", &target, "main")
            .await
            .unwrap();
        assert!(service.branch_exists("feature").await.unwrap());

        std::fs::write(target.join("scratch.txt"), "x").unwrap();
        let worktrees = service.list_worktrees().await.unwrap();
        assert_eq!(worktrees.len(), 2);
        assert!(worktrees[0].is_main);
        assert_eq!(worktrees[0].branch, "main");
        assert_eq!(worktrees[1].branch, "feature");
        assert_eq!(worktrees[1].untracked, 1);
        assert!(worktrees[1].dirty);

        let log = service.log_snapshot(&target).await.unwrap();
        assert!(log.contains("Initial commit"));

        service.remove_worktree(&target).await.unwrap();
        assert_eq!(service.list_worktrees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stage_commit_and_commit_files() {
        let temp = init_repo();
        let repo = temp.path().join("repo");
        let service = GitService::discover(&repo).await.unwrap();

        std::fs::write(repo.join("src.txt"), "code\n").unwrap();
        service.stage_file(&repo, "src.txt").await.unwrap();
        let status = service.status_snapshot(&repo).await.unwrap();
        assert!(status.contains("src.txt"));

        service.commit(&repo, "Add src").await.unwrap();
        let log = crate::models::parse_log(&service.log_snapshot(&repo).await.unwrap());
        assert_eq!(log[0].message, "Add src");

        let files = service.commit_files(&repo, &log[0].sha).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src.txt");
        assert_eq!(files[0].status, "A");
    }

    fn git_output(dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[tokio::test]
    async fn test_push_sets_upstream_then_sync_pushes() {
        let temp = init_repo();
        let repo = temp.path().join("repo");
        let remote = temp.path().join("remote.git");
        git(temp.path(), &["init", "-q", "--bare", "remote.git"]);
        git(&repo, &["remote", "add", "origin", remote.to_str().unwrap()]);
        let service = GitService::discover(&repo).await.unwrap();

        let target = UpstreamTarget {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            set_upstream: true,
        };
        service.push_branch(&repo, &target).await.unwrap();
        let worktrees = service.list_worktrees().await.unwrap();
        assert_eq!(worktrees[0].upstream.as_deref(), Some("origin/main"));

        std::fs::write(repo.join("next.txt"), "next\n").unwrap();
        git(&repo, &["add", "next.txt"]);
        git(&repo, &["commit", "-q", "-m", "Next"]);
        let target = UpstreamTarget {
            set_upstream: false,
            ..target
        };
        service
            .sync_branch(&repo, &target, MergeMethod::Rebase)
            .await
            .unwrap();
        assert_eq!(git_output(&remote, &["log", "-1", "--format=%s", "main"]), "Next");
    }

    #[tokio::test]
    async fn test_push_to_missing_remote_names_the_step() {
        let temp = init_repo();
        let repo = temp.path().join("repo");
        let service = GitService::discover(&repo).await.unwrap();
        let target = UpstreamTarget {
            remote: "nowhere".to_string(),
            branch: "main".to_string(),
            set_upstream: false,
        };
        let err = service
            .sync_branch(&repo, &target, MergeMethod::Merge)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("pull failed"));
    }
}
