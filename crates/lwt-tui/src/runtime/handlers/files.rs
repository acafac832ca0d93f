//! File, diff and shell handlers, plus the pickers' remote lookups.

use std::path::PathBuf;
use std::sync::Arc;

use lwt_core::git::RepositoryService;
use lwt_core::script::{self, ScriptKind, ScriptRequest};

use super::describe;
use crate::details_cache::DetailsCache;
use crate::events::UiEvent;
use crate::operations::{BranchSource, DiffScope};

const EMPTY_DIFF: &str = "No changes.";

// ============================================================================
// File operations
// ============================================================================

pub async fn stage_file(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    file: String,
    stage: bool,
) -> UiEvent {
    let result = if stage {
        repo.stage_file(&path, &file).await
    } else {
        repo.unstage_file(&path, &file).await
    };
    cache.invalidate(&path);
    let verb = if stage { "Staged" } else { "Unstaged" };
    UiEvent::FileOpFinished {
        result: result
            .map(|()| format!("{verb} {file}"))
            .map_err(|e| describe(&e)),
        path,
    }
}

pub async fn discard_file(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    file: String,
    untracked: bool,
) -> UiEvent {
    let result = repo.restore_file(&path, &file, untracked).await;
    cache.invalidate(&path);
    let verb = if untracked { "Deleted" } else { "Discarded changes to" };
    UiEvent::FileOpFinished {
        result: result
            .map(|()| format!("{verb} {file}"))
            .map_err(|e| describe(&e)),
        path,
    }
}

pub async fn commit(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    message: String,
) -> UiEvent {
    let result = repo.commit(&path, &message).await;
    cache.invalidate(&path);
    let subject = message.lines().next().unwrap_or_default();
    UiEvent::FileOpFinished {
        result: result
            .map(|()| format!("Committed: {subject}"))
            .map_err(|e| describe(&e)),
        path,
    }
}

pub async fn run_shell(
    repo: Arc<dyn RepositoryService>,
    cache: Arc<DetailsCache>,
    path: PathBuf,
    command: String,
) -> UiEvent {
    let result = repo.run_shell(&path, &command).await.map_err(|e| describe(&e));
    cache.invalidate(&path);
    UiEvent::ShellFinished {
        path,
        command,
        result,
    }
}

// ============================================================================
// Diffs
// ============================================================================

pub async fn load_diff(repo: Arc<dyn RepositoryService>, path: PathBuf, scope: DiffScope) -> UiEvent {
    let result = repo
        .diff(&path)
        .await
        .map(|diff| match &scope {
            DiffScope::All => diff.render(),
            DiffScope::Staged => diff.staged_only().render(),
            DiffScope::File(file) => diff.for_file(file).render(),
        })
        .map_err(|e| describe(&e));
    UiEvent::DiffLoaded { result }
}

pub async fn load_commit_files(
    repo: Arc<dyn RepositoryService>,
    path: PathBuf,
    sha: String,
) -> UiEvent {
    let result = repo.commit_files(&path, &sha).await.map_err(|e| describe(&e));
    UiEvent::CommitFilesLoaded { sha, result }
}

pub async fn load_commit_file_diff(
    repo: Arc<dyn RepositoryService>,
    path: PathBuf,
    sha: String,
    file: String,
) -> UiEvent {
    let result = repo
        .commit_file_diff(&path, &sha, &file)
        .await
        .map(|diff| {
            if diff.trim().is_empty() {
                EMPTY_DIFF.to_string()
            } else {
                diff
            }
        })
        .map_err(|e| describe(&e));
    UiEvent::DiffLoaded { result }
}

// ============================================================================
// Pull requests / issues
// ============================================================================

pub async fn load_pull_requests(repo: Arc<dyn RepositoryService>) -> UiEvent {
    let result = repo.pull_requests().await.map_err(|e| describe(&e));
    UiEvent::PullRequestsLoaded { result }
}

pub async fn load_issues(repo: Arc<dyn RepositoryService>) -> UiEvent {
    let result = repo.issues().await.map_err(|e| describe(&e));
    UiEvent::IssuesLoaded { result }
}

/// Asks the configured script for a branch name. Any failure falls back to
/// `suggested`.
pub async fn suggest_branch_name(
    script: Option<String>,
    source: BranchSource,
    suggested: String,
) -> UiEvent {
    let (kind, number, title, body) = match &source {
        BranchSource::PullRequest(pr) => (ScriptKind::Pr, pr.number, &pr.title, &pr.body),
        BranchSource::Issue(issue) => (ScriptKind::Issue, issue.number, &issue.title, &issue.body),
    };
    let request = ScriptRequest {
        script: String::new(),
        kind,
        number,
        suggested,
        content: format!("{title}\n\n{body}"),
    };
    let name = script::branch_name_or_default(script.as_deref(), request).await;
    UiEvent::BranchNameSuggested { source, name }
}

#[cfg(test)]
mod tests {
    use lwt_core::git::WorktreeDiff;
    use lwt_core::models::Issue;

    use super::*;
    use crate::details_cache::DetailsSnapshot;
    use crate::runtime::fake::FakeRepo;

    #[tokio::test]
    async fn test_stage_invalidates_cache() {
        let repo = Arc::new(FakeRepo::with_worktrees(&["/repo"]));
        let cache = Arc::new(DetailsCache::default());
        cache.insert(PathBuf::from("/repo"), DetailsSnapshot::default());

        let event = stage_file(
            repo,
            Arc::clone(&cache),
            PathBuf::from("/repo"),
            "src/lib.rs".to_string(),
            true,
        )
        .await;
        match event {
            UiEvent::FileOpFinished { result, .. } => {
                assert_eq!(result.as_deref(), Ok("Staged src/lib.rs"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_diff_says_no_changes() {
        let repo = FakeRepo::with_worktrees(&["/repo"]);
        let event = load_diff(Arc::new(repo), PathBuf::from("/repo"), DiffScope::All).await;
        match event {
            UiEvent::DiffLoaded { result } => assert_eq!(result.as_deref(), Ok("No changes.")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_staged_scope_hides_unstaged_changes() {
        let repo = FakeRepo::with_worktrees(&["/repo"]);
        repo.set_diff(WorktreeDiff {
            unstaged: "diff --git a/x b/x\n+x\n".to_string(),
            ..WorktreeDiff::default()
        });
        let event = load_diff(Arc::new(repo), PathBuf::from("/repo"), DiffScope::Staged).await;
        match event {
            UiEvent::DiffLoaded { result } => assert_eq!(result.as_deref(), Ok("No changes.")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_suggest_without_script_keeps_suggestion() {
        let issue = Issue {
            number: 7,
            title: "Fix it".to_string(),
            body: String::new(),
        };
        let event = suggest_branch_name(
            None,
            BranchSource::Issue(issue),
            "issue-7-fix-it".to_string(),
        )
        .await;
        match event {
            UiEvent::BranchNameSuggested { name, .. } => assert_eq!(name, "issue-7-fix-it"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
