//! Creating worktrees from a branch, a pull request or an issue.

use lwt_core::models::{Issue, PullRequest, default_branch_name};
use tracing::info;

use super::{
    BranchSource, CreateRequest, CreateSource, hide_loading, set_input_error, show_loading,
};
use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{InputPurpose, Screen, ScreenRequest};
use crate::state::AppState;
use crate::trust_gate::{self, CommandHook, Continuation, PendingOperation};

/// `c`: pick the base branch.
pub fn open_branch_picker(app: &mut AppState) -> Vec<UiEffect> {
    if app.tui.repo.is_none() {
        return Vec::new();
    }
    app.open_screen(ScreenRequest::ListSelect {
        title: "Create worktree from".to_string(),
    });
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Branches, &mut effects);
    effects.push(UiEffect::LoadBranches { task });
    effects
}

pub fn open_pr_picker(app: &mut AppState) -> Vec<UiEffect> {
    if app.tui.repo.is_none() {
        return Vec::new();
    }
    app.open_screen(ScreenRequest::PrSelect);
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::PullRequests, &mut effects);
    effects.push(UiEffect::LoadPullRequests { task });
    effects
}

pub fn open_issue_picker(app: &mut AppState) -> Vec<UiEffect> {
    if app.tui.repo.is_none() {
        return Vec::new();
    }
    app.open_screen(ScreenRequest::IssueSelect);
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Issues, &mut effects);
    effects.push(UiEffect::LoadIssues { task });
    effects
}

pub fn on_branches_loaded(app: &mut AppState, result: Result<Vec<String>, String>) {
    if let Some(Screen::ListSelect(picker)) = app.screens.active_mut() {
        picker.set_items(result);
    }
}

pub fn on_pull_requests_loaded(app: &mut AppState, result: Result<Vec<PullRequest>, String>) {
    if let Some(Screen::PrSelect(picker)) = app.screens.active_mut() {
        picker.set_items(result);
    }
}

pub fn on_issues_loaded(app: &mut AppState, result: Result<Vec<Issue>, String>) {
    if let Some(Screen::IssueSelect(picker)) = app.screens.active_mut() {
        picker.set_items(result);
    }
}

/// A pull request or issue was picked: suggest a branch name for it.
pub fn suggest_branch_name(app: &mut AppState, source: BranchSource) -> Vec<UiEffect> {
    let suggested = match &source {
        BranchSource::PullRequest(pr) => default_branch_name("pr", pr.number, &pr.title),
        BranchSource::Issue(issue) => default_branch_name("issue", issue.number, &issue.title),
    };
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::BranchName, &mut effects);
    effects.push(UiEffect::SuggestBranchName {
        task,
        source,
        suggested,
    });
    effects
}

pub fn on_branch_name_suggested(app: &mut AppState, source: BranchSource, name: String) {
    let (title, source) = match source {
        BranchSource::PullRequest(pr) => (
            format!("Branch for PR #{}", pr.number),
            CreateSource::PullRequest(pr),
        ),
        BranchSource::Issue(issue) => (
            format!("Branch for issue #{}", issue.number),
            CreateSource::Issue {
                number: issue.number,
                base: app.tui.main_branch.clone(),
            },
        ),
    };
    app.open_screen(ScreenRequest::Input {
        title,
        purpose: InputPurpose::CreateBranch { source },
        initial: name,
    });
}

/// Enter on the branch-name input. Cheap checks run here; the ones that
/// need git run in a validation task.
pub fn submit(app: &mut AppState, source: CreateSource, branch: String) -> Vec<UiEffect> {
    if branch.is_empty() {
        set_input_error(app, "Branch name cannot be empty.".to_string());
        return Vec::new();
    }
    if app.tui.worktrees.iter().any(|wt| wt.branch == branch) {
        set_input_error(app, format!("Branch \"{branch}\" already exists."));
        return Vec::new();
    }
    let Some(dir) = app.tui.repo_worktree_dir() else {
        return Vec::new();
    };
    let request = CreateRequest {
        target: dir.join(&branch),
        branch,
        source,
    };
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Validate, &mut effects);
    effects.push(UiEffect::ValidateCreate { task, request });
    effects
}

pub fn on_validated(
    app: &mut AppState,
    request: CreateRequest,
    error: Option<String>,
) -> Vec<UiEffect> {
    let input_open = matches!(
        app.screens.active(),
        Some(Screen::Input(input)) if matches!(input.purpose, InputPurpose::CreateBranch { .. })
    );
    if !input_open {
        // Dismissed while validating.
        return Vec::new();
    }
    if let Some(error) = error {
        set_input_error(app, error);
        return Vec::new();
    }

    show_loading(
        app,
        format!("Creating worktree {} {}…", request.branch, request.source.describe()),
    );
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Create, &mut effects);
    effects.push(UiEffect::CreateWorktree { task, request });
    effects
}

/// On success the new worktree is selected once the list reloads, after its
/// init commands went through the trust gate.
pub fn on_created(
    app: &mut AppState,
    request: CreateRequest,
    result: Result<(), String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    if let Err(error) = result {
        app.show_info(format!("Failed to create worktree\n\n{error}"));
        return refresh::reload_worktrees(&mut app.tui);
    }

    info!(branch = %request.branch, path = %request.target.display(), "worktree created");
    app.tui.message = Some(format!("Created worktree {}", request.branch));
    app.tui.pending_select = Some(request.target.clone());
    let env = app.tui.worktree_env(&request.branch, &request.target);
    trust_gate::request(
        app,
        PendingOperation::new(
            CommandHook::Init,
            request.target,
            env,
            Continuation::ReloadWorktrees,
        ),
    )
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use lwt_core::config::Config;
    use lwt_core::git::RepoContext;
    use lwt_core::models::WorktreeInfo;

    use super::*;
    use crate::details_cache::DetailsCache;
    use crate::screens::ScreenKind;

    fn app() -> AppState {
        let config = Config {
            worktree_dir: Some("/wts".to_string()),
            ..Config::default()
        };
        let mut app = AppState::new(config, PathBuf::from("/repo"), Arc::new(DetailsCache::default()));
        app.tui.repo = Some(RepoContext {
            toplevel: PathBuf::from("/repo"),
            common_dir: PathBuf::from("/repo/.git"),
            repo_name: "repo".to_string(),
            repo_key: "acme/repo".to_string(),
        });
        let mut main = WorktreeInfo::new("/repo", "main");
        main.is_main = true;
        app.tui.worktrees = vec![main, WorktreeInfo::new("/wts/acme/repo/feature", "feature")];
        app.tui.refresh_visible();
        app
    }

    fn open_input(app: &mut AppState) {
        app.open_screen(ScreenRequest::Input {
            title: "New branch".to_string(),
            purpose: InputPurpose::CreateBranch {
                source: CreateSource::Branch("main".to_string()),
            },
            initial: String::new(),
        });
    }

    fn input_error(app: &AppState) -> Option<String> {
        match app.screens.active() {
            Some(Screen::Input(input)) => input.error.clone(),
            _ => None,
        }
    }

    #[test]
    fn test_empty_and_duplicate_names_stay_on_input() {
        let mut app = app();
        open_input(&mut app);

        let effects = submit(&mut app, CreateSource::Branch("main".to_string()), String::new());
        assert!(effects.is_empty());
        assert_eq!(input_error(&app).as_deref(), Some("Branch name cannot be empty."));

        let effects = submit(
            &mut app,
            CreateSource::Branch("main".to_string()),
            "feature".to_string(),
        );
        assert!(effects.is_empty());
        assert_eq!(
            input_error(&app).as_deref(),
            Some("Branch \"feature\" already exists.")
        );
        assert_eq!(app.screens.kind(), ScreenKind::Input);
    }

    #[test]
    fn test_submit_targets_repo_worktree_dir() {
        let mut app = app();
        open_input(&mut app);
        let effects = submit(&mut app, CreateSource::Branch("main".to_string()), "new".to_string());
        match effects.as_slice() {
            [UiEffect::ValidateCreate { request, .. }] => {
                assert_eq!(request.target, Path::new("/wts/acme/repo/new"));
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_keeps_input_open() {
        let mut app = app();
        open_input(&mut app);
        let request = CreateRequest {
            branch: "new".to_string(),
            target: PathBuf::from("/wts/acme/repo/new"),
            source: CreateSource::Branch("main".to_string()),
        };
        let effects = on_validated(
            &mut app,
            request.clone(),
            Some("Path already exists: /wts/acme/repo/new".to_string()),
        );
        assert!(effects.is_empty());
        assert_eq!(app.screens.kind(), ScreenKind::Input);
        assert!(input_error(&app).is_some());

        let effects = on_validated(&mut app, request, None);
        assert_eq!(app.screens.kind(), ScreenKind::Loading);
        assert!(matches!(effects.as_slice(), [UiEffect::CreateWorktree { .. }]));
    }

    #[test]
    fn test_created_selects_target_and_gates_init_commands() {
        let mut app = app();
        let request = CreateRequest {
            branch: "new".to_string(),
            target: PathBuf::from("/wts/acme/repo/new"),
            source: CreateSource::Branch("main".to_string()),
        };
        let effects = on_created(&mut app, request, Ok(()));
        assert_eq!(app.tui.pending_select.as_deref(), Some(Path::new("/wts/acme/repo/new")));
        match effects.as_slice() {
            [UiEffect::CheckTrust { op, .. }] => {
                assert_eq!(op.hook, CommandHook::Init);
                assert_eq!(op.cwd, Path::new("/wts/acme/repo/new"));
                assert_eq!(op.env.get("WORKTREE_BRANCH"), Some("new"));
                assert_eq!(op.continuation, Continuation::ReloadWorktrees);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn test_issue_suggestion_opens_prefilled_input() {
        let mut app = app();
        let issue = Issue {
            number: 42,
            title: "Crash on start".to_string(),
            body: String::new(),
        };
        let effects = suggest_branch_name(&mut app, BranchSource::Issue(issue.clone()));
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::SuggestBranchName { suggested, .. }] if suggested.starts_with("issue-42")
        ));

        on_branch_name_suggested(&mut app, BranchSource::Issue(issue), "issue-42-crash".to_string());
        match app.screens.active() {
            Some(Screen::Input(input)) => {
                assert_eq!(input.value, "issue-42-crash");
                assert_eq!(
                    input.purpose,
                    InputPurpose::CreateBranch {
                        source: CreateSource::Issue {
                            number: 42,
                            base: "main".to_string()
                        }
                    }
                );
            }
            _ => panic!("expected input"),
        }
    }
}
