//! Effect execution.
//!
//! [`EffectExecutor`] owns everything effects need that the reducer must not
//! see: the connected repository, the session store, the trust store and the
//! metadata watcher. Quick persistence effects run inline; everything that
//! touches git or a subprocess is spawned with a task lifecycle and reports
//! back through the inbox.
//!
//! ## Supersession
//!
//! At most one cancelable task per [`TaskKind`] is live. Spawning a new one
//! cancels the previous token right away, without waiting for the reducer to
//! see the older `TaskStarted`. A cancelled task completes with `None`.
//! One-shot kinds (mutations, hook batches, trust checks, push and sync) are
//! spawned without a token, so overlapping runs all deliver their results.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lwt_core::config::{Config, SortMode};
use lwt_core::git::{GitService, RepoFuture, RepositoryService};
use lwt_core::persistence::RepoStore;
use lwt_core::trust::TrustStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handlers;
use super::inbox::UiEventSender;
use crate::common::{TaskCompleted, TaskId, TaskKind, TaskMeta, TaskStarted};
use crate::debounce::{self, DEBOUNCE_DELAY};
use crate::details_cache::DetailsCache;
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::operations::upstream::UpstreamAction;
use crate::watch;

/// Opens a repository by directory.
pub trait RepoConnector: Send + Sync {
    fn connect<'a>(&'a self, dir: &'a Path) -> RepoFuture<'a, Arc<dyn RepositoryService>>;
}

/// Connects through the `git` binary.
pub struct GitConnector;

impl RepoConnector for GitConnector {
    fn connect<'a>(&'a self, dir: &'a Path) -> RepoFuture<'a, Arc<dyn RepositoryService>> {
        Box::pin(async move {
            let service = GitService::discover(dir).await?;
            Ok(Arc::new(service) as Arc<dyn RepositoryService>)
        })
    }
}

/// External collaborators of the executor.
pub struct Services {
    pub trust: Arc<dyn TrustStore>,
    pub connector: Arc<dyn RepoConnector>,
    /// Config file that `PersistSortMode` rewrites.
    pub config_path: PathBuf,
    pub watch: bool,
}

pub struct EffectExecutor {
    inbox_tx: UiEventSender,
    services: Services,
    cache: Arc<DetailsCache>,
    config: Arc<Config>,
    start_dir: PathBuf,
    repo: Option<Arc<dyn RepositoryService>>,
    store: Option<RepoStore>,
    watcher: Option<JoinHandle<()>>,
    live: HashMap<TaskKind, CancellationToken>,
    debounce_delay: Duration,
}

impl EffectExecutor {
    pub fn new(
        inbox_tx: UiEventSender,
        services: Services,
        cache: Arc<DetailsCache>,
        config: Config,
        start_dir: PathBuf,
    ) -> Self {
        Self {
            inbox_tx,
            services,
            cache,
            config: Arc::new(config),
            start_dir,
            repo: None,
            store: None,
            watcher: None,
            live: HashMap::new(),
            debounce_delay: DEBOUNCE_DELAY,
        }
    }

    /// Spawns an untracked async effect and sends its result when complete.
    fn spawn_effect<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(f().await);
        });
    }

    /// Spawns an async task with a uniform TaskStarted/TaskCompleted lifecycle.
    fn spawn_task<F, Fut, R>(
        &mut self,
        kind: TaskKind,
        id: TaskId,
        meta: TaskMeta,
        cancelable: bool,
        f: F,
    ) where
        F: FnOnce(Option<CancellationToken>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<Option<UiEvent>> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        let cancel = cancelable.then(CancellationToken::new);
        if let Some(token) = &cancel
            && let Some(previous) = self.live.insert(kind, token.clone())
        {
            previous.cancel();
        }
        let started = TaskStarted {
            id,
            cancel: cancel.clone(),
            meta,
        };
        let _ = tx.send(UiEvent::TaskStarted { kind, started });
        tokio::spawn(async move {
            let fut = f(cancel.clone());
            let result = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    out = fut => if token.is_cancelled() { None } else { out.into() },
                },
                None => fut.await.into(),
            };
            if result.is_none() {
                debug!(?kind, id = id.0, "task cancelled");
            }
            let completed = TaskCompleted {
                id,
                result: result.map(Box::new),
            };
            let _ = tx.send(UiEvent::TaskCompleted { kind, completed });
        });
    }

    fn label(text: impl Into<String>) -> TaskMeta {
        TaskMeta::Label(text.into())
    }

    /// The connected repository, or an error event when there is none.
    fn repo(&self) -> Option<Arc<dyn RepositoryService>> {
        if self.repo.is_none() {
            let _ = self
                .inbox_tx
                .send(UiEvent::Error("No repository is open.".to_string()));
        }
        self.repo.as_ref().map(Arc::clone)
    }

    fn persist(&self, what: &str, f: impl FnOnce(&RepoStore) -> anyhow::Result<()>) {
        let Some(store) = &self.store else {
            debug!("no session store; skipping {what}");
            return;
        };
        if let Err(error) = f(store) {
            warn!(dir = %store.dir().display(), error = %format!("{error:#}"), "failed to save {what}");
        }
    }

    /// Executes a single effect by dispatching to the appropriate handler.
    pub fn execute(&mut self, effect: UiEffect) {
        match effect {
            // Owned by the runtime loop.
            UiEffect::Quit => {}

            // ================================================================
            // Session
            // ================================================================
            UiEffect::DiscoverRepository { task } => {
                let connector = Arc::clone(&self.services.connector);
                let dir = self.start_dir.clone();
                self.spawn_task(
                    TaskKind::WorktreeList,
                    task,
                    Self::label("Opening repository"),
                    true,
                    move |_| handlers::discover_repository(connector, dir),
                );
            }
            UiEffect::AttachRepository { repo } => self.attach(repo.0),
            UiEffect::LoadSession => {
                if let Some(store) = self.store.clone() {
                    self.spawn_effect(move || handlers::load_session(store));
                }
            }
            UiEffect::SaveWorktreeCache { worktrees } => {
                self.persist("worktree cache", |s| s.save_worktree_cache(&worktrees));
            }
            UiEffect::SaveAccessHistory { history } => {
                self.persist("access history", |s| s.save_access_history(&history));
            }
            UiEffect::SaveLastSelected { path } => {
                self.persist("last selection", |s| s.save_last_selected(&path));
            }
            UiEffect::PushCommandHistory { command } => {
                self.persist("command history", |s| {
                    s.push_command_history(&command).map(|_| ())
                });
            }
            UiEffect::RecordPaletteUse { id } => {
                let now = chrono::Utc::now().timestamp();
                self.persist("palette history", |s| s.record_palette_use(&id, now).map(|_| ()));
            }
            UiEffect::PersistSortMode { mode } => self.persist_sort_mode(mode),

            // ================================================================
            // Queries
            // ================================================================
            UiEffect::LoadWorktrees { task } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::WorktreeList,
                    task,
                    Self::label("Loading worktrees"),
                    true,
                    move |_| handlers::list_worktrees(repo),
                );
            }
            UiEffect::ScheduleDebounce { task, index } => {
                let delay = self.debounce_delay;
                self.spawn_task(TaskKind::Debounce, task, TaskMeta::None, true, move |cancel| {
                    debounce::timer(index, delay, cancel)
                });
            }
            UiEffect::LoadDetails {
                task,
                path,
                main_branch,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(TaskKind::Details, task, TaskMeta::None, true, move |_| {
                    handlers::load_details(repo, cache, path, main_branch)
                });
            }
            UiEffect::LoadBranches { task } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(TaskKind::Branches, task, TaskMeta::None, true, move |_| {
                    handlers::load_branches(repo)
                });
            }
            UiEffect::LoadPullRequests { task } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::PullRequests,
                    task,
                    Self::label("Fetching pull requests"),
                    true,
                    move |_| handlers::load_pull_requests(repo),
                );
            }
            UiEffect::LoadIssues { task } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::Issues,
                    task,
                    Self::label("Fetching issues"),
                    true,
                    move |_| handlers::load_issues(repo),
                );
            }
            UiEffect::LoadDiff { task, path, scope } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(TaskKind::Diff, task, TaskMeta::None, true, move |_| {
                    handlers::load_diff(repo, path, scope)
                });
            }
            UiEffect::LoadCommitFiles { task, path, sha } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(TaskKind::CommitFiles, task, TaskMeta::None, true, move |_| {
                    handlers::load_commit_files(repo, path, sha)
                });
            }
            UiEffect::LoadCommitFileDiff {
                task,
                path,
                sha,
                file,
            } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(TaskKind::Diff, task, TaskMeta::None, true, move |_| {
                    handlers::load_commit_file_diff(repo, path, sha, file)
                });
            }
            UiEffect::ScanPruneCandidates { task, main_branch } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::PruneScan,
                    task,
                    Self::label("Scanning"),
                    false,
                    move |_| handlers::scan_prune_candidates(repo, main_branch),
                );
            }
            UiEffect::SuggestBranchName {
                task,
                source,
                suggested,
            } => {
                let script = self.config.branch_name_script().map(str::to_string);
                self.spawn_task(
                    TaskKind::BranchName,
                    task,
                    Self::label("Generating branch name"),
                    true,
                    move |_| handlers::suggest_branch_name(script, source, suggested),
                );
            }

            // ================================================================
            // Trust-gated commands
            // ================================================================
            UiEffect::CheckTrust { task, op } => {
                let trust = Arc::clone(&self.services.trust);
                let config = Arc::clone(&self.config);
                let root = self
                    .repo
                    .as_ref()
                    .map_or_else(|| self.start_dir.clone(), |r| r.context().toplevel.clone());
                self.spawn_task(TaskKind::TrustCheck, task, TaskMeta::None, false, move |_| {
                    handlers::check_trust(trust, config, root, op)
                });
            }
            UiEffect::RecordTrust { path, blocked } => {
                let result = if blocked {
                    self.services.trust.record_block(&path)
                } else {
                    self.services.trust.record_trust(&path)
                };
                if let Err(error) = result {
                    warn!(path = %path.display(), error = %format!("{error:#}"), "failed to record trust decision");
                }
            }
            UiEffect::RunCommands { task, op } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                let label = format!("Running {} commands", op.hook.label());
                self.spawn_task(TaskKind::Commands, task, Self::label(label), false, move |_| {
                    handlers::run_commands(repo, cache, op)
                });
            }

            // ================================================================
            // Worktree operations
            // ================================================================
            UiEffect::ValidateCreate { task, request } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(TaskKind::Validate, task, TaskMeta::None, true, move |_| {
                    handlers::validate_create(repo, request)
                });
            }
            UiEffect::CreateWorktree { task, request } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::Create,
                    task,
                    Self::label("Creating worktree"),
                    false,
                    move |_| handlers::create_worktree(repo, request),
                );
            }
            UiEffect::DeleteWorktree { task, path, branch } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(
                    TaskKind::Delete,
                    task,
                    Self::label("Deleting worktree"),
                    false,
                    move |_| handlers::delete_worktree(repo, cache, path, branch),
                );
            }
            UiEffect::DeleteBranch { task, branch } => {
                let Some(repo) = self.repo() else { return };
                self.spawn_task(
                    TaskKind::Delete,
                    task,
                    Self::label("Deleting branch"),
                    false,
                    move |_| handlers::delete_branch(repo, branch),
                );
            }
            UiEffect::ValidateRename { task, request } => {
                self.spawn_task(TaskKind::Validate, task, TaskMeta::None, true, move |_| {
                    handlers::validate_rename(request)
                });
            }
            UiEffect::RenameWorktree { task, request } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(
                    TaskKind::Rename,
                    task,
                    Self::label("Renaming worktree"),
                    false,
                    move |_| handlers::rename_worktree(repo, cache, request),
                );
            }
            UiEffect::AbsorbWorktree {
                task,
                worktree,
                main_path,
                main_branch,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                let method = self.config.merge_method;
                self.spawn_task(
                    TaskKind::Absorb,
                    task,
                    Self::label("Absorbing worktree"),
                    false,
                    move |_| {
                        handlers::absorb_worktree(repo, cache, worktree, main_path, main_branch, method)
                    },
                );
            }
            UiEffect::UpdateUpstream { task, request } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                let method = self.config.merge_method;
                let label = match request.action {
                    UpstreamAction::Push => "Pushing",
                    UpstreamAction::Sync => "Synchronising",
                };
                self.spawn_task(
                    TaskKind::Upstream,
                    task,
                    Self::label(label),
                    false,
                    move |_| handlers::update_upstream(repo, cache, request, method),
                );
            }
            UiEffect::PruneWorktree { target, commands } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_effect(move || {
                    handlers::prune_worktree(repo, cache, target, commands)
                });
            }

            // ================================================================
            // File operations
            // ================================================================
            UiEffect::StageFile {
                task,
                path,
                file,
                stage,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(TaskKind::FileOp, task, TaskMeta::None, false, move |_| {
                    handlers::stage_file(repo, cache, path, file, stage)
                });
            }
            UiEffect::DiscardFile {
                task,
                path,
                file,
                untracked,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(TaskKind::FileOp, task, TaskMeta::None, false, move |_| {
                    handlers::discard_file(repo, cache, path, file, untracked)
                });
            }
            UiEffect::Commit {
                task,
                path,
                message,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                self.spawn_task(
                    TaskKind::FileOp,
                    task,
                    Self::label("Committing"),
                    false,
                    move |_| handlers::commit(repo, cache, path, message),
                );
            }
            UiEffect::RunShell {
                task,
                path,
                command,
            } => {
                let Some(repo) = self.repo() else { return };
                let cache = Arc::clone(&self.cache);
                let label = format!("Running {command}");
                self.spawn_task(TaskKind::Shell, task, Self::label(label), false, move |_| {
                    handlers::run_shell(repo, cache, path, command)
                });
            }

            // ================================================================
            // Cancellation
            // ================================================================
            UiEffect::CancelTask { kind, token } => {
                if let Some(token) = token {
                    token.cancel();
                }
                debug!(?kind, "task cancelled by reducer");
            }
        }
    }

    fn attach(&mut self, repo: Arc<dyn RepositoryService>) {
        let ctx = repo.context();
        self.store = Some(RepoStore::for_repo(
            &self.config.worktree_dir(),
            &ctx.repo_key,
        ));
        if let Some(old) = self.watcher.take() {
            old.abort();
        }
        if self.services.watch {
            self.watcher = watch::spawn_watcher(&ctx.common_dir, self.inbox_tx.clone());
        }
        self.cache.reset();
        self.repo = Some(repo);
    }

    fn persist_sort_mode(&self, mode: SortMode) {
        if let Err(error) = Config::save_sort_mode_to(&self.services.config_path, mode) {
            warn!(error = %format!("{error:#}"), "failed to save sort mode");
        }
    }

    #[cfg(test)]
    pub(crate) fn set_debounce_delay(&mut self, delay: Duration) {
        self.debounce_delay = delay;
    }
}

impl Drop for EffectExecutor {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        for token in self.live.values() {
            token.cancel();
        }
    }
}
