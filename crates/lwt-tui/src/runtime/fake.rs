//! In-memory repository for handler and executor tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{anyhow, bail};
use lwt_core::commands::CommandEnv;
use lwt_core::config::MergeMethod;
use lwt_core::git::{RepoContext, RepoFuture, RepositoryService, UpstreamTarget, WorktreeDiff};
use lwt_core::models::{CommitFile, Issue, PullRequest, WorktreeInfo};

#[derive(Debug, Default)]
struct Recorded {
    branches: Vec<String>,
    merged: Vec<String>,
    diff: WorktreeDiff,
    removed: Vec<PathBuf>,
    deleted_branches: Vec<String>,
    commands: Vec<(Vec<String>, PathBuf)>,
    /// (`push` or `sync`, worktree, target)
    upstream: Vec<(&'static str, PathBuf, UpstreamTarget)>,
}

/// The first path is the main worktree on `main`; the others are on a
/// branch named after their directory.
pub struct FakeRepo {
    ctx: RepoContext,
    worktrees: Vec<WorktreeInfo>,
    recorded: Mutex<Recorded>,
    status_calls: AtomicUsize,
    fail_main_branch: AtomicBool,
}

impl FakeRepo {
    pub fn with_worktrees(paths: &[&str]) -> Self {
        let worktrees: Vec<WorktreeInfo> = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let mut wt = WorktreeInfo::new(*path, "");
                wt.branch = if i == 0 { "main".to_string() } else { wt.name() };
                wt.is_main = i == 0;
                wt
            })
            .collect();
        let toplevel = worktrees
            .first()
            .map_or_else(|| PathBuf::from("/repo"), |wt| wt.path.clone());
        Self {
            ctx: RepoContext {
                common_dir: toplevel.join(".git"),
                toplevel,
                repo_name: "repo".to_string(),
                repo_key: "repo".to_string(),
            },
            recorded: Mutex::new(Recorded {
                branches: worktrees.iter().map(|wt| wt.branch.clone()).collect(),
                ..Recorded::default()
            }),
            worktrees,
            status_calls: AtomicUsize::new(0),
            fail_main_branch: AtomicBool::new(false),
        }
    }

    pub fn fail_main_branch(&self) {
        self.fail_main_branch.store(true, Ordering::SeqCst);
    }

    pub fn add_branch(&self, branch: &str) {
        self.recorded().branches.push(branch.to_string());
    }

    pub fn set_merged(&self, branches: &[&str]) {
        self.recorded().merged = branches.iter().map(ToString::to_string).collect();
    }

    pub fn set_diff(&self, diff: WorktreeDiff) {
        self.recorded().diff = diff;
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.recorded().removed.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.recorded().deleted_branches.clone()
    }

    pub fn commands_run(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.recorded().commands.clone()
    }

    pub fn upstream_calls(&self) -> Vec<(&'static str, PathBuf, UpstreamTarget)> {
        self.recorded().upstream.clone()
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

impl RepositoryService for FakeRepo {
    fn context(&self) -> &RepoContext {
        &self.ctx
    }

    fn list_worktrees(&self) -> RepoFuture<'_, Vec<WorktreeInfo>> {
        Box::pin(async move { Ok(self.worktrees.clone()) })
    }

    fn status_snapshot<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, String> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("# branch.head {}\n", path.display()))
        })
    }

    fn log_snapshot<'a>(&'a self, _path: &'a Path) -> RepoFuture<'a, String> {
        Box::pin(async { Ok("0123456789abcdef\tAda\tInitial commit".to_string()) })
    }

    fn unpushed_commits<'a>(&'a self, _path: &'a Path) -> RepoFuture<'a, HashSet<String>> {
        Box::pin(async { Err(anyhow!("no upstream")) })
    }

    fn unmerged_commits<'a>(
        &'a self,
        _path: &'a Path,
        _main_branch: &'a str,
    ) -> RepoFuture<'a, HashSet<String>> {
        Box::pin(async { Ok(HashSet::new()) })
    }

    fn execute_commands<'a>(
        &'a self,
        commands: &'a [String],
        cwd: &'a Path,
        _env: &'a CommandEnv,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            self.recorded()
                .commands
                .push((commands.to_vec(), cwd.to_path_buf()));
            Ok(())
        })
    }

    fn main_branch(&self) -> RepoFuture<'_, String> {
        Box::pin(async move {
            if self.fail_main_branch.load(Ordering::SeqCst) {
                bail!("no origin/HEAD");
            }
            Ok("main".to_string())
        })
    }

    fn branches(&self) -> RepoFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.recorded().branches.clone()) })
    }

    fn branch_exists<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, bool> {
        Box::pin(async move { Ok(self.recorded().branches.iter().any(|b| b == branch)) })
    }

    fn merged_branches<'a>(&'a self, _base: &'a str) -> RepoFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(self.recorded().merged.clone()) })
    }

    fn diff<'a>(&'a self, _path: &'a Path) -> RepoFuture<'a, WorktreeDiff> {
        Box::pin(async move { Ok(self.recorded().diff.clone()) })
    }

    fn commit_files<'a>(
        &'a self,
        _path: &'a Path,
        _sha: &'a str,
    ) -> RepoFuture<'a, Vec<CommitFile>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn commit_file_diff<'a>(
        &'a self,
        _path: &'a Path,
        _sha: &'a str,
        _file: &'a str,
    ) -> RepoFuture<'a, String> {
        Box::pin(async { Ok(String::new()) })
    }

    fn pull_requests(&self) -> RepoFuture<'_, Vec<PullRequest>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn issues(&self) -> RepoFuture<'_, Vec<Issue>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn create_worktree<'a>(
        &'a self,
        branch: &'a str,
        _target: &'a Path,
        _base: &'a str,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            self.recorded().branches.push(branch.to_string());
            Ok(())
        })
    }

    fn create_worktree_from_pr<'a>(
        &'a self,
        _pr: &'a PullRequest,
        branch: &'a str,
        target: &'a Path,
    ) -> RepoFuture<'a, ()> {
        self.create_worktree(branch, target, "origin/pr")
    }

    fn remove_worktree<'a>(&'a self, path: &'a Path) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            self.recorded().removed.push(path.to_path_buf());
            Ok(())
        })
    }

    fn delete_branch<'a>(&'a self, branch: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async move {
            self.recorded().deleted_branches.push(branch.to_string());
            Ok(())
        })
    }

    fn rename_worktree<'a>(
        &'a self,
        _old_path: &'a Path,
        _new_path: &'a Path,
        _old_branch: &'a str,
        _new_branch: &'a str,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn absorb_worktree<'a>(
        &'a self,
        _worktree: &'a WorktreeInfo,
        _main_path: &'a Path,
        _main_branch: &'a str,
        _method: MergeMethod,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn prune_metadata(&self) -> RepoFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn push_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
    ) -> RepoFuture<'a, String> {
        Box::pin(async move {
            self.recorded()
                .upstream
                .push(("push", path.to_path_buf(), target.clone()));
            Ok(format!("pushed to {}/{}", target.remote, target.branch))
        })
    }

    fn sync_branch<'a>(
        &'a self,
        path: &'a Path,
        target: &'a UpstreamTarget,
        _method: MergeMethod,
    ) -> RepoFuture<'a, String> {
        Box::pin(async move {
            if target.remote == "offline" {
                bail!("pull failed: could not read from remote");
            }
            self.recorded()
                .upstream
                .push(("sync", path.to_path_buf(), target.clone()));
            Ok(String::new())
        })
    }

    fn stage_file<'a>(&'a self, _path: &'a Path, _file: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn unstage_file<'a>(&'a self, _path: &'a Path, _file: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn restore_file<'a>(
        &'a self,
        _path: &'a Path,
        _file: &'a str,
        _untracked: bool,
    ) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn commit<'a>(&'a self, _path: &'a Path, _message: &'a str) -> RepoFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn run_shell<'a>(&'a self, _path: &'a Path, command: &'a str) -> RepoFuture<'a, String> {
        Box::pin(async move { Ok(format!("ran {command}\n")) })
    }
}
