//! Pushing a worktree's branch, or pulling then pushing it.
//!
//! Both refuse a worktree with local changes or a detached HEAD. A branch
//! with a tracking ref goes straight to the remote; one without is asked for
//! `remote/branch` first and gets it recorded as upstream on push.

use std::path::PathBuf;

use lwt_core::git::UpstreamTarget;
use lwt_core::models::{DETACHED, parse_upstream_ref};
use tracing::info;

use super::{hide_loading, set_input_error, show_loading};
use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{InputPurpose, ScreenRequest};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamAction {
    Push,
    /// Pull (per `merge_method`), then push.
    Sync,
}

impl UpstreamAction {
    fn verb(self) -> &'static str {
        match self {
            UpstreamAction::Push => "push",
            UpstreamAction::Sync => "synchronise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub action: UpstreamAction,
    pub path: PathBuf,
    pub local_branch: String,
    pub target: UpstreamTarget,
}

/// `P` / `S` on the selected worktree.
pub fn start(app: &mut AppState, action: UpstreamAction) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree().cloned() else {
        return Vec::new();
    };
    let verb = action.verb();
    if wt.has_changes() {
        app.show_info(format!(
            "Cannot {verb} while the worktree has local changes.\n\nCommit, stash, or discard them first."
        ));
        return Vec::new();
    }
    if wt.branch.trim().is_empty() || wt.branch == DETACHED {
        app.show_info(format!("Cannot {verb} a detached worktree."));
        return Vec::new();
    }

    if !wt.has_upstream {
        let initial = format!("origin/{}", wt.branch);
        app.open_screen(ScreenRequest::Input {
            title: format!("Set upstream for '{}'", wt.branch),
            purpose: InputPurpose::SetUpstream {
                action,
                path: wt.path,
                branch: wt.branch,
            },
            initial,
        });
        return Vec::new();
    }

    let upstream = wt.upstream.as_deref().unwrap_or_default().trim();
    if upstream.is_empty() {
        app.show_info(format!("Cannot {verb} because no upstream is configured."));
        return Vec::new();
    }
    let Some((remote, branch)) = parse_upstream_ref(upstream) else {
        app.show_info(format!(
            "Cannot {verb} because upstream {upstream:?} is not in remote/branch format."
        ));
        return Vec::new();
    };
    if branch != wt.branch {
        app.show_info(format!(
            "Cannot {verb} because upstream {upstream:?} does not match current branch {:?}.",
            wt.branch
        ));
        return Vec::new();
    }

    begin(
        app,
        UpstreamRequest {
            action,
            path: wt.path,
            local_branch: wt.branch,
            target: UpstreamTarget {
                remote,
                branch,
                set_upstream: false,
            },
        },
    )
}

/// Enter on the upstream prompt.
pub fn submit(
    app: &mut AppState,
    action: UpstreamAction,
    path: PathBuf,
    local_branch: String,
    value: String,
) -> Vec<UiEffect> {
    let Some((remote, branch)) = parse_upstream_ref(&value) else {
        set_input_error(app, "Provide the upstream as remote/branch.".to_string());
        return Vec::new();
    };
    if branch != local_branch {
        set_input_error(app, format!("Upstream branch must match {local_branch:?}."));
        return Vec::new();
    }
    begin(
        app,
        UpstreamRequest {
            action,
            path,
            local_branch,
            target: UpstreamTarget {
                remote,
                branch,
                set_upstream: true,
            },
        },
    )
}

fn begin(app: &mut AppState, request: UpstreamRequest) -> Vec<UiEffect> {
    show_loading(
        app,
        match request.action {
            UpstreamAction::Push => "Pushing to upstream…",
            UpstreamAction::Sync => "Synchronising with upstream…",
        },
    );
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Upstream, &mut effects);
    effects.push(UiEffect::UpdateUpstream { task, request });
    effects
}

/// Reloads the list either way so ahead/behind counts catch up.
pub fn on_updated(
    app: &mut AppState,
    request: UpstreamRequest,
    result: Result<String, String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    let target = format!("{}/{}", request.target.remote, request.target.branch);
    match (request.action, result) {
        (UpstreamAction::Push, Ok(_)) => {
            info!(branch = %request.local_branch, %target, "pushed");
            app.tui.message = Some(format!("Pushed {} to {target}", request.local_branch));
        }
        (UpstreamAction::Sync, Ok(_)) => {
            info!(branch = %request.local_branch, %target, "synchronised");
            app.tui.message = Some(format!(
                "Synchronised {} with {target}",
                request.local_branch
            ));
        }
        (UpstreamAction::Push, Err(error)) => app.show_info(format!("Push failed\n\n{error}")),
        (UpstreamAction::Sync, Err(error)) => {
            app.show_info(format!("Synchronise failed\n\n{error}"));
        }
    }
    refresh::reload_worktrees(&mut app.tui)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use lwt_core::config::Config;
    use lwt_core::models::WorktreeInfo;

    use super::*;
    use crate::details_cache::DetailsCache;
    use crate::screens::{Screen, ScreenKind};

    fn app_with(wt: WorktreeInfo) -> AppState {
        let mut app = AppState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        app.tui.worktrees = vec![wt];
        app.tui.refresh_visible();
        app
    }

    fn tracked(upstream: &str) -> WorktreeInfo {
        let mut wt = WorktreeInfo::new("/wts/feature", "feature");
        wt.has_upstream = true;
        wt.upstream = Some(upstream.to_string());
        wt
    }

    fn info_message(app: &AppState) -> Option<&str> {
        match app.screens.active() {
            Some(Screen::Info(info)) => Some(info.message.as_str()),
            _ => None,
        }
    }

    fn input_error(app: &AppState) -> Option<String> {
        match app.screens.active() {
            Some(Screen::Input(input)) => input.error.clone(),
            _ => None,
        }
    }

    #[test]
    fn test_local_changes_block_push() {
        let mut wt = tracked("origin/feature");
        wt.modified = 1;
        let mut app = app_with(wt);
        assert!(start(&mut app, UpstreamAction::Push).is_empty());
        assert_eq!(
            info_message(&app),
            Some("Cannot push while the worktree has local changes.\n\nCommit, stash, or discard them first.")
        );
    }

    #[test]
    fn test_detached_worktree_cannot_sync() {
        let mut app = app_with(WorktreeInfo::new("/wts/x", DETACHED));
        assert!(start(&mut app, UpstreamAction::Sync).is_empty());
        assert_eq!(info_message(&app), Some("Cannot synchronise a detached worktree."));
    }

    #[test]
    fn test_tracked_branch_pushes_to_its_upstream() {
        let mut app = app_with(tracked("origin/feature"));
        let effects = start(&mut app, UpstreamAction::Push);
        match effects.as_slice() {
            [UiEffect::UpdateUpstream { request, .. }] => {
                assert_eq!(request.action, UpstreamAction::Push);
                assert_eq!(request.path, Path::new("/wts/feature"));
                assert_eq!(request.target.remote, "origin");
                assert_eq!(request.target.branch, "feature");
                assert!(!request.target.set_upstream);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
        assert_eq!(app.screens.kind(), ScreenKind::Loading);
        assert!(app.tui.tasks.upstream.is_running());
    }

    #[test]
    fn test_mismatched_upstream_is_refused() {
        let mut app = app_with(tracked("origin/other"));
        assert!(start(&mut app, UpstreamAction::Sync).is_empty());
        assert_eq!(
            info_message(&app),
            Some(
                "Cannot synchronise because upstream \"origin/other\" does not match current branch \"feature\"."
            )
        );
    }

    #[test]
    fn test_untracked_branch_prompts_then_sets_upstream() {
        let mut app = app_with(WorktreeInfo::new("/wts/feature", "feature"));
        assert!(start(&mut app, UpstreamAction::Push).is_empty());
        match app.screens.active() {
            Some(Screen::Input(input)) => assert_eq!(input.value, "origin/feature"),
            _ => panic!("expected upstream prompt"),
        }

        let path = PathBuf::from("/wts/feature");
        let effects = submit(
            &mut app,
            UpstreamAction::Push,
            path.clone(),
            "feature".into(),
            "origin".into(),
        );
        assert!(effects.is_empty());
        assert_eq!(
            input_error(&app).as_deref(),
            Some("Provide the upstream as remote/branch.")
        );

        let effects = submit(
            &mut app,
            UpstreamAction::Push,
            path.clone(),
            "feature".into(),
            "origin/main".into(),
        );
        assert!(effects.is_empty());
        assert_eq!(
            input_error(&app).as_deref(),
            Some("Upstream branch must match \"feature\".")
        );

        let effects = submit(
            &mut app,
            UpstreamAction::Push,
            path,
            "feature".into(),
            "fork/feature".into(),
        );
        match effects.as_slice() {
            [UiEffect::UpdateUpstream { request, .. }] => {
                assert_eq!(request.target.remote, "fork");
                assert!(request.target.set_upstream);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn test_failed_sync_reports_and_reloads() {
        let mut app = app_with(tracked("origin/feature"));
        let request = UpstreamRequest {
            action: UpstreamAction::Sync,
            path: PathBuf::from("/wts/feature"),
            local_branch: "feature".into(),
            target: UpstreamTarget {
                remote: "origin".into(),
                branch: "feature".into(),
                set_upstream: false,
            },
        };
        let effects = on_updated(&mut app, request.clone(), Err("pull failed: conflict".into()));
        assert_eq!(
            info_message(&app),
            Some("Synchronise failed\n\npull failed: conflict")
        );
        assert!(matches!(effects.as_slice(), [UiEffect::LoadWorktrees { .. }]));

        let mut app = app_with(tracked("origin/feature"));
        on_updated(&mut app, request, Ok(String::new()));
        assert_eq!(
            app.tui.message.as_deref(),
            Some("Synchronised feature with origin/feature")
        );
    }
}
