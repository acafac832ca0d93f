//! Worktree operations.
//!
//! Each flow is a set of reducer steps: a step validates against session
//! state, opens the next screen and returns the effects that do the work.
//! Results come back as events and are handled by the flow's `on_*` step.

pub mod create;
pub mod files;
pub mod remove;
pub mod rename;
pub mod upstream;

use std::path::PathBuf;

use lwt_core::models::{Issue, PullRequest};

use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{Screen, ScreenKind};
use crate::state::AppState;
use crate::trust_gate::Continuation;

/// Where a new worktree's branch comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSource {
    /// A new branch off an existing one.
    Branch(String),
    /// Checks out the pull request's head.
    PullRequest(PullRequest),
    /// A new branch off the main branch.
    Issue { number: u64, base: String },
}

impl CreateSource {
    pub fn describe(&self) -> String {
        match self {
            CreateSource::Branch(base) => format!("from {base}"),
            CreateSource::PullRequest(pr) => format!("for PR #{}", pr.number),
            CreateSource::Issue { number, .. } => format!("for issue #{number}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub branch: String,
    pub target: PathBuf,
    pub source: CreateSource,
}

/// What a suggested branch name is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSource {
    PullRequest(PullRequest),
    Issue(Issue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub path: PathBuf,
    pub old_branch: String,
    pub new_branch: String,
    pub new_path: PathBuf,
}

/// A worktree whose branch is merged into the main branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneCandidate {
    pub path: PathBuf,
    pub branch: String,
    pub dirty: bool,
}

/// Which part of a worktree's diff to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffScope {
    All,
    Staged,
    File(String),
}

/// Runs what follows a trust-gated command batch.
///
/// `commands` are the approved commands; only prune batches use them, since
/// every prune target runs them in its own worktree.
pub fn run_continuation(
    app: &mut AppState,
    continuation: Continuation,
    commands: Vec<String>,
) -> Vec<UiEffect> {
    match continuation {
        Continuation::ReloadWorktrees => refresh::reload_worktrees(&mut app.tui),
        Continuation::DeleteWorktree { path, branch } => remove::start_delete(app, path, branch),
        Continuation::PruneWorktrees { targets } => remove::start_prune(app, targets, commands),
    }
}

/// Shows a validation error on the active Input screen.
///
/// Returns false if the input was dismissed in the meantime.
pub(crate) fn set_input_error(app: &mut AppState, error: String) -> bool {
    match app.screens.active_mut() {
        Some(Screen::Input(input)) => {
            input.error = Some(error);
            true
        }
        _ => false,
    }
}

/// Opens the Loading screen in place of whatever is open.
pub(crate) fn show_loading(app: &mut AppState, message: impl Into<String>) {
    app.open_screen(crate::screens::ScreenRequest::Loading {
        message: message.into(),
    });
}

pub(crate) fn hide_loading(app: &mut AppState) {
    app.screens.close_if(ScreenKind::Loading);
}
