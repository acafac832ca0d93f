//! Renaming a worktree: the branch is renamed and the directory follows.

use std::path::PathBuf;

use tracing::info;

use super::{RenameRequest, hide_loading, set_input_error, show_loading};
use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{InputPurpose, Screen, ScreenRequest};
use crate::state::AppState;

/// `m`: prompt for the new name, prefilled with the current branch.
pub fn open(app: &mut AppState) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree() else {
        return Vec::new();
    };
    if wt.is_main {
        app.show_info("Cannot rename the main worktree.");
        return Vec::new();
    }
    let (path, branch) = (wt.path.clone(), wt.branch.clone());
    app.open_screen(ScreenRequest::Input {
        title: "Rename worktree".to_string(),
        purpose: InputPurpose::Rename {
            path,
            branch: branch.clone(),
        },
        initial: branch,
    });
    Vec::new()
}

pub fn submit(
    app: &mut AppState,
    path: PathBuf,
    old_branch: String,
    new_branch: String,
) -> Vec<UiEffect> {
    if new_branch.is_empty() {
        set_input_error(app, "Name cannot be empty.".to_string());
        return Vec::new();
    }
    if new_branch == old_branch {
        set_input_error(
            app,
            "Name must be different from the current branch.".to_string(),
        );
        return Vec::new();
    }
    let new_path = path
        .parent()
        .map_or_else(|| PathBuf::from(&new_branch), |parent| parent.join(&new_branch));
    let request = RenameRequest {
        path,
        old_branch,
        new_branch,
        new_path,
    };
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Validate, &mut effects);
    effects.push(UiEffect::ValidateRename { task, request });
    effects
}

pub fn on_validated(
    app: &mut AppState,
    request: RenameRequest,
    error: Option<String>,
) -> Vec<UiEffect> {
    let input_open = matches!(
        app.screens.active(),
        Some(Screen::Input(input)) if matches!(input.purpose, InputPurpose::Rename { .. })
    );
    if !input_open {
        return Vec::new();
    }
    if let Some(error) = error {
        set_input_error(app, error);
        return Vec::new();
    }
    show_loading(
        app,
        format!("Renaming {} to {}…", request.old_branch, request.new_branch),
    );
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Rename, &mut effects);
    effects.push(UiEffect::RenameWorktree { task, request });
    effects
}

pub fn on_renamed(
    app: &mut AppState,
    request: RenameRequest,
    result: Result<(), String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    match result {
        Ok(()) => {
            info!(from = %request.old_branch, to = %request.new_branch, "worktree renamed");
            app.tui.message = Some(format!("Renamed to {}", request.new_branch));
            app.tui.pending_select = Some(request.new_path);
        }
        Err(error) => app.show_info(format!("Failed to rename worktree\n\n{error}")),
    }
    refresh::reload_worktrees(&mut app.tui)
}
