//! Worktree list, details and lifecycle handlers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use lwt_core::config::{Config, MergeMethod, RepoConfig};
use lwt_core::git::RepositoryService;
use lwt_core::models::WorktreeInfo;
use lwt_core::trust::{TrustStatus, TrustStore};
use tracing::{debug, info, warn};

use super::{blocking, describe};
use crate::details_cache::{DetailsCache, DetailsSnapshot};
use crate::events::{UiEvent, WorktreeListing};
use crate::operations::upstream::{UpstreamAction, UpstreamRequest};
use crate::operations::{CreateRequest, CreateSource, PruneCandidate, RenameRequest};
use crate::trust_gate::{CommandHook, PendingOperation, PruneTarget};

const FALLBACK_MAIN_BRANCH: &str = "main";

// ============================================================================
// Queries
// ============================================================================

pub async fn list_worktrees(repo: Arc<dyn RepositoryService>) -> UiEvent {
    let (worktrees, main_branch) = tokio::join!(repo.list_worktrees(), repo.main_branch());
    let main_branch = main_branch.unwrap_or_else(|error| {
        debug!(error = %describe(&error), "main branch unresolved; assuming {FALLBACK_MAIN_BRANCH}");
        FALLBACK_MAIN_BRANCH.to_string()
    });
    let result = worktrees
        .map(|worktrees| WorktreeListing {
            worktrees,
            main_branch,
        })
        .map_err(|e| describe(&e));
    UiEvent::WorktreesLoaded { result }
}

/// Status and log for one worktree, read through the details cache.
pub async fn load_details(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    main_branch: String,
) -> UiEvent {
    let result = cache
        .read_or_fetch(&path, || fetch_details(repo.as_ref(), &path, &main_branch))
        .await
        .map_err(|e| describe(&e));
    UiEvent::DetailsLoaded { path, result }
}

async fn fetch_details(
    repo: &dyn RepositoryService,
    path: &Path,
    main_branch: &str,
) -> Result<DetailsSnapshot> {
    let (status, log, unpushed, unmerged) = tokio::join!(
        repo.status_snapshot(path),
        repo.log_snapshot(path),
        repo.unpushed_commits(path),
        repo.unmerged_commits(path, main_branch),
    );
    Ok(DetailsSnapshot {
        status: status?,
        // An unborn branch has no log yet.
        log: log.unwrap_or_default(),
        unpushed: commit_set(unpushed, "unpushed"),
        unmerged: commit_set(unmerged, "unmerged"),
    })
}

/// Commit markers are decoration; a failed lookup just shows none.
fn commit_set(result: Result<HashSet<String>>, what: &str) -> HashSet<String> {
    result.unwrap_or_else(|error| {
        debug!(error = %describe(&error), "no {what} commit set");
        HashSet::new()
    })
}

pub async fn load_branches(repo: Arc<dyn RepositoryService>) -> UiEvent {
    let result = repo.branches().await.map_err(|e| describe(&e));
    UiEvent::BranchesLoaded { result }
}

// ============================================================================
// Create
// ============================================================================

pub async fn validate_create(repo: Arc<dyn RepositoryService>, request: CreateRequest) -> UiEvent {
    let error = match repo.branch_exists(&request.branch).await {
        Ok(true) => Some(format!("Branch \"{}\" already exists.", request.branch)),
        Ok(false) if request.target.exists() => Some(format!(
            "Path already exists: {}",
            request.target.display()
        )),
        Ok(false) => None,
        Err(error) => Some(describe(&error)),
    };
    UiEvent::CreateValidated { request, error }
}

pub async fn create_worktree(repo: Arc<dyn RepositoryService>, request: CreateRequest) -> UiEvent {
    let result = match &request.source {
        CreateSource::Branch(base) | CreateSource::Issue { base, .. } => {
            repo.create_worktree(&request.branch, &request.target, base)
                .await
        }
        CreateSource::PullRequest(pr) => {
            repo.create_worktree_from_pr(pr, &request.branch, &request.target)
                .await
        }
    };
    if result.is_ok() {
        info!(branch = %request.branch, target = %request.target.display(), "worktree created");
    }
    UiEvent::WorktreeCreated {
        request,
        result: result.map_err(|e| describe(&e)),
    }
}

// ============================================================================
// Delete / rename / absorb
// ============================================================================

pub async fn delete_worktree(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    branch: String,
) -> UiEvent {
    let result = repo.remove_worktree(&path).await.map_err(|e| describe(&e));
    cache.invalidate(&path);
    UiEvent::WorktreeDeleted {
        path,
        branch,
        result,
    }
}

pub async fn delete_branch(repo: Arc<dyn RepositoryService>, branch: String) -> UiEvent {
    let result = repo.delete_branch(&branch).await.map_err(|e| describe(&e));
    UiEvent::BranchDeleted { branch, result }
}

pub async fn validate_rename(request: RenameRequest) -> UiEvent {
    let error = tokio::fs::try_exists(&request.new_path)
        .await
        .unwrap_or(true)
        .then(|| format!("Destination already exists: {}", request.new_path.display()));
    UiEvent::RenameValidated { request, error }
}

pub async fn rename_worktree(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    request: RenameRequest,
) -> UiEvent {
    let result = repo
        .rename_worktree(
            &request.path,
            &request.new_path,
            &request.old_branch,
            &request.new_branch,
        )
        .await
        .map_err(|e| describe(&e));
    cache.invalidate(&request.path);
    UiEvent::WorktreeRenamed { request, result }
}

pub async fn absorb_worktree(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    worktree: WorktreeInfo,
    main_path: PathBuf,
    main_branch: String,
    method: MergeMethod,
) -> UiEvent {
    let result = repo
        .absorb_worktree(&worktree, &main_path, &main_branch, method)
        .await
        .map_err(|e| describe(&e));
    cache.invalidate(&main_path);
    cache.invalidate(&worktree.path);
    UiEvent::WorktreeAbsorbed {
        path: worktree.path,
        branch: worktree.branch,
        result,
    }
}

pub async fn update_upstream(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    request: UpstreamRequest,
    method: MergeMethod,
) -> UiEvent {
    let result = match request.action {
        UpstreamAction::Push => repo.push_branch(&request.path, &request.target).await,
        UpstreamAction::Sync => repo.sync_branch(&request.path, &request.target, method).await,
    }
    .map_err(|e| describe(&e));
    if let Err(error) = &result {
        warn!(path = %request.path.display(), %error, "upstream update failed");
    }
    cache.invalidate(&request.path);
    UiEvent::UpstreamUpdated { request, result }
}

// ============================================================================
// Prune
// ============================================================================

/// Drops stale metadata, then lists worktrees whose branch is merged.
pub async fn scan_prune_candidates(repo: Arc<dyn RepositoryService>, main_branch: String) -> UiEvent {
    UiEvent::PruneCandidatesLoaded {
        result: prune_candidates(repo.as_ref(), &main_branch)
            .await
            .map_err(|e| describe(&e)),
    }
}

async fn prune_candidates(
    repo: &dyn RepositoryService,
    main_branch: &str,
) -> Result<Vec<PruneCandidate>> {
    if let Err(error) = repo.prune_metadata().await {
        warn!(error = %describe(&error), "git worktree prune failed");
    }
    let (worktrees, merged) = tokio::join!(repo.list_worktrees(), repo.merged_branches(main_branch));
    let merged: HashSet<String> = merged?.into_iter().collect();
    Ok(worktrees?
        .into_iter()
        .filter(|wt| !wt.is_main && wt.branch != main_branch && merged.contains(&wt.branch))
        .map(|wt| PruneCandidate {
            dirty: wt.has_changes(),
            path: wt.path,
            branch: wt.branch,
        })
        .collect())
}

/// Terminate commands, then removal, then the branch. Command failures are
/// logged and do not stop the removal.
pub async fn prune_worktree(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    target: PruneTarget,
    commands: Vec<String>,
) -> UiEvent {
    if !commands.is_empty()
        && let Err(error) = repo
            .execute_commands(&commands, &target.path, &target.env)
            .await
    {
        warn!(path = %target.path.display(), error = %describe(&error), "terminate commands failed");
    }
    let result = async {
        repo.remove_worktree(&target.path).await?;
        repo.delete_branch(&target.branch).await
    }
    .await
    .map_err(|e| describe(&e));
    cache.invalidate(&target.path);
    UiEvent::WorktreePruned {
        path: target.path,
        result,
    }
}

// ============================================================================
// Trust-gated commands
// ============================================================================

/// Collects the hook's commands (global config first, then the repository's
/// `.wt`) and the trust status of the `.wt` file.
pub async fn check_trust(
    trust: Arc<dyn TrustStore>,
    config: Arc<Config>,
    repo_root: PathBuf,
    mut op: PendingOperation,
) -> UiEvent {
    let root = op
        .env
        .get("MAIN_WORKTREE_PATH")
        .map_or(repo_root, PathBuf::from);

    let repo_config = match blocking(move || RepoConfig::load(&root)).await {
        Ok(repo_config) => repo_config,
        Err(error) => {
            return UiEvent::TrustChecked {
                op,
                result: Err(describe(&error)),
            };
        }
    };

    let (global, declared) = match op.hook {
        CommandHook::Init => (
            &config.init_commands,
            repo_config.as_ref().map(|c| &c.init_commands),
        ),
        CommandHook::Terminate => (
            &config.terminate_commands,
            repo_config.as_ref().map(|c| &c.terminate_commands),
        ),
    };
    op.commands = global.clone();
    let declares_commands = declared.is_some_and(|commands| !commands.is_empty());
    if let Some(declared) = declared {
        op.commands.extend(declared.iter().cloned());
    }
    op.trust_path = repo_config
        .filter(|_| declares_commands)
        .map(|c| c.path);

    let result = match op.trust_path.clone() {
        // Global commands are the user's own.
        None => Ok(TrustStatus::Trusted),
        Some(path) => blocking(move || trust.check_trust(&path))
            .await
            .map_err(|e| describe(&e)),
    };
    UiEvent::TrustChecked { op, result }
}

/// Runs an approved batch. Prune batches never come through here: their
/// commands run per target inside [`prune_worktree`].
pub async fn run_commands(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    op: PendingOperation,
) -> UiEvent {
    let error = repo
        .execute_commands(&op.commands, &op.cwd, &op.env)
        .await
        .err()
        .map(|e| describe(&e));
    cache.invalidate(&op.cwd);
    UiEvent::CommandsFinished {
        continuation: op.continuation,
        error,
    }
}
