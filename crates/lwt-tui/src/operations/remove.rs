//! Removing worktrees: delete, absorb into main, and prune merged ones.
//!
//! All three run the terminate commands through the trust gate before the
//! worktree goes away.

use std::path::{Path, PathBuf};

use lwt_core::models::{DETACHED, WorktreeInfo};
use tracing::{info, warn};

use super::{PruneCandidate, hide_loading, show_loading};
use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{ConfirmAction, ScreenRequest};
use crate::state::{AppState, PruneProgress};
use crate::trust_gate::{self, CommandHook, Continuation, PendingOperation, PruneTarget};

// ============================================================================
// Delete
// ============================================================================

/// `D`: confirm deleting the selected worktree.
pub fn confirm_delete(app: &mut AppState) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree() else {
        return Vec::new();
    };
    if wt.is_main {
        app.show_info("Cannot delete the main worktree.");
        return Vec::new();
    }
    let (path, branch) = (wt.path.clone(), wt.branch.clone());
    let mut message = format!(
        "Delete worktree?\n\nPath: {}\nBranch: {branch}",
        path.display()
    );
    if wt.has_changes() {
        message.push_str("\n\nThe worktree has uncommitted changes.");
    }
    app.open_screen(ScreenRequest::Confirm {
        message,
        action: ConfirmAction::DeleteWorktree { path, branch },
    });
    Vec::new()
}

/// Deletion confirmed: terminate commands first, removal as continuation.
pub fn on_delete_confirmed(app: &mut AppState, path: PathBuf, branch: String) -> Vec<UiEffect> {
    let env = app.tui.worktree_env(&branch, &path);
    trust_gate::request(
        app,
        PendingOperation::new(
            CommandHook::Terminate,
            path.clone(),
            env,
            Continuation::DeleteWorktree { path, branch },
        ),
    )
}

pub fn start_delete(app: &mut AppState, path: PathBuf, branch: String) -> Vec<UiEffect> {
    show_loading(app, format!("Deleting worktree {}…", path.display()));
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Delete, &mut effects);
    effects.push(UiEffect::DeleteWorktree { task, path, branch });
    effects
}

/// A removed worktree leaves its branch behind; offer to delete it too.
pub fn on_deleted(
    app: &mut AppState,
    path: PathBuf,
    branch: String,
    result: Result<(), String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    match result {
        Ok(()) => {
            info!(path = %path.display(), "worktree deleted");
            app.tui.message = Some(format!("Deleted worktree {}", path.display()));
            if !branch.is_empty() && branch != DETACHED && branch != app.tui.main_branch {
                app.open_screen(ScreenRequest::Confirm {
                    message: format!("Delete branch '{branch}'?"),
                    action: ConfirmAction::DeleteBranch { branch },
                });
            }
        }
        Err(error) => app.show_info(format!("Failed to delete worktree\n\n{error}")),
    }
    refresh::reload_worktrees(&mut app.tui)
}

pub fn on_delete_branch_confirmed(app: &mut AppState, branch: String) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Delete, &mut effects);
    effects.push(UiEffect::DeleteBranch { task, branch });
    effects
}

pub fn on_branch_deleted(app: &mut AppState, branch: &str, result: Result<(), String>) {
    match result {
        Ok(()) => app.tui.message = Some(format!("Deleted branch {branch}")),
        Err(error) => app.show_info(format!("Failed to delete branch {branch}\n\n{error}")),
    }
}

// ============================================================================
// Absorb
// ============================================================================

/// `A`: merge the selected worktree's branch into main, then delete it.
pub fn confirm_absorb(app: &mut AppState) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree().cloned() else {
        return Vec::new();
    };
    if wt.is_main {
        app.show_info("Cannot absorb the main worktree.");
        return Vec::new();
    }
    let main_branch = app.tui.main_branch.clone();
    if wt.branch == main_branch {
        app.show_info(format!(
            "Cannot absorb: worktree is on the main branch ({main_branch})."
        ));
        return Vec::new();
    }
    let dirty_main = app
        .tui
        .main_worktree()
        .filter(|main| main.has_changes())
        .map(|main| main.path.clone());
    if let Some(main_path) = dirty_main {
        app.show_info(format!(
            "Cannot absorb: main worktree has uncommitted changes.\n\nCommit or stash changes in:\n{}",
            main_path.display()
        ));
        return Vec::new();
    }

    let method = app.tui.config.merge_method.as_str();
    app.open_screen(ScreenRequest::Confirm {
        message: format!(
            "Absorb worktree into main ({method})?\n\nBranch: {}\nInto: {main_branch}\n\nThe worktree is deleted afterwards.",
            wt.branch
        ),
        action: ConfirmAction::Absorb { worktree: wt },
    });
    Vec::new()
}

pub fn on_absorb_confirmed(app: &mut AppState, worktree: WorktreeInfo) -> Vec<UiEffect> {
    let Some(main_path) = app.tui.main_path() else {
        return Vec::new();
    };
    let main_branch = app.tui.main_branch.clone();
    show_loading(
        app,
        format!("Absorbing {} into {main_branch}…", worktree.branch),
    );
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Absorb, &mut effects);
    effects.push(UiEffect::AbsorbWorktree {
        task,
        worktree,
        main_path,
        main_branch,
    });
    effects
}

/// A successful absorb continues as a regular delete.
pub fn on_absorbed(
    app: &mut AppState,
    path: PathBuf,
    branch: String,
    result: Result<(), String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    match result {
        Ok(()) => {
            info!(%branch, "worktree absorbed");
            on_delete_confirmed(app, path, branch)
        }
        Err(error) => {
            app.show_info(format!("Absorb failed\n\n{error}"));
            refresh::reload_worktrees(&mut app.tui)
        }
    }
}

// ============================================================================
// Prune
// ============================================================================

/// `X`: look for worktrees whose branch is merged into main.
pub fn scan_prune(app: &mut AppState) -> Vec<UiEffect> {
    if app.tui.repo.is_none() {
        return Vec::new();
    }
    show_loading(app, "Scanning for merged worktrees…");
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::PruneScan, &mut effects);
    effects.push(UiEffect::ScanPruneCandidates {
        task,
        main_branch: app.tui.main_branch.clone(),
    });
    effects
}

pub fn on_prune_candidates(
    app: &mut AppState,
    result: Result<Vec<PruneCandidate>, String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    match result {
        Err(error) => app.show_info(format!("Error: {error}")),
        Ok(candidates) if candidates.is_empty() => {
            app.show_info("No merged worktrees or orphaned directories to prune.");
        }
        Ok(candidates) => app.open_screen(ScreenRequest::Checklist { candidates }),
    }
    Vec::new()
}

/// Checklist submitted: gate the terminate commands for the whole batch.
pub fn on_prune_submitted(app: &mut AppState, candidates: Vec<PruneCandidate>) -> Vec<UiEffect> {
    let Some(main_path) = app.tui.main_path() else {
        return Vec::new();
    };
    let targets: Vec<PruneTarget> = candidates
        .into_iter()
        .map(|c| PruneTarget {
            env: app.tui.worktree_env(&c.branch, &c.path),
            path: c.path,
            branch: c.branch,
        })
        .collect();
    let main_branch = app.tui.main_branch.clone();
    let env = app.tui.worktree_env(&main_branch, &main_path);
    trust_gate::request(
        app,
        PendingOperation::new(
            CommandHook::Terminate,
            main_path,
            env,
            Continuation::PruneWorktrees { targets },
        ),
    )
}

/// Fans the batch out; each target reports back on its own.
pub fn start_prune(
    app: &mut AppState,
    targets: Vec<PruneTarget>,
    commands: Vec<String>,
) -> Vec<UiEffect> {
    if targets.is_empty() {
        return refresh::reload_worktrees(&mut app.tui);
    }
    let count = targets.len();
    app.tui.prune = Some(PruneProgress {
        remaining: count,
        ..PruneProgress::default()
    });
    show_loading(app, format!("Pruning {count} worktrees…"));
    targets
        .into_iter()
        .map(|target| UiEffect::PruneWorktree {
            target,
            commands: commands.clone(),
        })
        .collect()
}

pub fn on_pruned(app: &mut AppState, path: &Path, result: Result<(), String>) -> Vec<UiEffect> {
    let Some(progress) = app.tui.prune.as_mut() else {
        return Vec::new();
    };
    match result {
        Ok(()) => progress.pruned += 1,
        Err(error) => {
            warn!(path = %path.display(), %error, "prune failed");
            progress.failed += 1;
        }
    }
    progress.remaining = progress.remaining.saturating_sub(1);
    if progress.remaining > 0 {
        return Vec::new();
    }

    let PruneProgress { pruned, failed, .. } = app.tui.prune.take().unwrap_or_default();
    hide_loading(app);
    let summary = if failed > 0 {
        format!("Pruned {pruned} merged worktrees ({failed} failed)")
    } else {
        format!("Pruned {pruned} merged worktrees")
    };
    app.show_info(summary);
    refresh::reload_worktrees(&mut app.tui)
}
