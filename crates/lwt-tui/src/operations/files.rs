//! File-level actions on the selected worktree: stage, discard, commit,
//! diffs and shell commands.

use std::path::PathBuf;

use lwt_core::persistence::COMMAND_HISTORY_LIMIT;

use super::{DiffScope, hide_loading, set_input_error, show_loading};
use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::refresh;
use crate::screens::{ConfirmAction, InputPurpose, Screen, ScreenRequest};
use crate::state::AppState;
use crate::views::StatusRow;

fn selected_row(app: &AppState) -> Option<StatusRow> {
    app.tui.status_rows().into_iter().nth(app.tui.status_selected)
}

/// Space in the status pane: stage an unstaged file, unstage a fully
/// staged one.
pub fn toggle_stage(app: &mut AppState) -> Vec<UiEffect> {
    let Some(path) = app.tui.selected_path().map(PathBuf::from) else {
        return Vec::new();
    };
    let Some(StatusRow::File { file, .. }) = selected_row(app) else {
        return Vec::new();
    };
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::FileOp, &mut effects);
    effects.push(UiEffect::StageFile {
        task,
        path,
        stage: !file.is_fully_staged(),
        file: file.path,
    });
    effects
}

/// Enter in the status pane: toggle a directory, or show a file's diff.
pub fn open_status_row(app: &mut AppState) -> Vec<UiEffect> {
    match selected_row(app) {
        Some(StatusRow::Dir { path, .. }) => {
            if !app.tui.collapsed_dirs.remove(&path) {
                app.tui.collapsed_dirs.insert(path);
            }
            Vec::new()
        }
        Some(StatusRow::File { file, .. }) => show_diff(app, DiffScope::File(file.path)),
        None => Vec::new(),
    }
}

/// `d` in the status pane.
pub fn confirm_discard(app: &mut AppState) -> Vec<UiEffect> {
    let Some(path) = app.tui.selected_path().map(PathBuf::from) else {
        return Vec::new();
    };
    let Some(StatusRow::File { file, .. }) = selected_row(app) else {
        return Vec::new();
    };
    let message = if file.untracked {
        format!("Delete untracked file?\n\n{}", file.path)
    } else {
        format!("Discard changes to file?\n\n{}", file.path)
    };
    app.open_screen(ScreenRequest::Confirm {
        message,
        action: ConfirmAction::DiscardFile {
            path,
            file: file.path,
            untracked: file.untracked,
        },
    });
    Vec::new()
}

pub fn on_discard_confirmed(
    app: &mut AppState,
    path: PathBuf,
    file: String,
    untracked: bool,
) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::FileOp, &mut effects);
    effects.push(UiEffect::DiscardFile {
        task,
        path,
        file,
        untracked,
    });
    effects
}

/// `C`: open the commit editor.
pub fn open_commit(app: &mut AppState) -> Vec<UiEffect> {
    let Some(path) = app.tui.selected_path().map(PathBuf::from) else {
        return Vec::new();
    };
    if !app.tui.details.files.iter().any(|f| f.is_staged()) {
        app.tui.message = Some("Nothing staged to commit.".to_string());
        return Vec::new();
    }
    app.open_screen(ScreenRequest::Commit { path });
    Vec::new()
}

pub fn commit(app: &mut AppState, path: PathBuf, message: String) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::FileOp, &mut effects);
    effects.push(UiEffect::Commit {
        task,
        path,
        message,
    });
    effects
}

/// Stage, discard and commit results. The handler already dropped the
/// cached details, so the refresh reads fresh.
pub fn on_file_op_finished(
    app: &mut AppState,
    path: &std::path::Path,
    result: Result<String, String>,
) -> Vec<UiEffect> {
    match result {
        Ok(message) => {
            if !message.is_empty() {
                app.tui.message = Some(message);
            }
        }
        Err(error) => app.show_info(format!("Error: {error}")),
    }
    if app.tui.selected_path() == Some(path) {
        refresh::request_details(&mut app.tui)
    } else {
        Vec::new()
    }
}

// ============================================================================
// Diffs
// ============================================================================

/// Opens the Diff screen for the selected worktree.
pub fn show_diff(app: &mut AppState, scope: DiffScope) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree() else {
        return Vec::new();
    };
    let path = wt.path.clone();
    let title = match &scope {
        DiffScope::All => format!("Diff: {}", wt.branch),
        DiffScope::Staged => format!("Staged: {}", wt.branch),
        DiffScope::File(file) => file.clone(),
    };
    app.open_screen(ScreenRequest::Diff { title });
    load_diff(app, path, scope)
}

/// Loads a diff into a Diff screen that is already open.
pub fn load_diff(app: &mut AppState, path: PathBuf, scope: DiffScope) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Diff, &mut effects);
    effects.push(UiEffect::LoadDiff { task, path, scope });
    effects
}

pub fn on_diff_loaded(app: &mut AppState, result: Result<String, String>) {
    if let Some(Screen::Diff(diff)) = app.screens.active_mut() {
        diff.set_content(result);
    }
}

/// Enter in the log pane: list the files of the selected commit.
pub fn open_commit_files(app: &mut AppState) -> Vec<UiEffect> {
    let Some(path) = app.tui.selected_path().map(PathBuf::from) else {
        return Vec::new();
    };
    let Some(commit) = app.tui.log_rows().get(app.tui.log_selected).map(|c| c.entry.clone()) else {
        return Vec::new();
    };
    app.open_screen(ScreenRequest::CommitFiles {
        path: path.clone(),
        sha: commit.sha.clone(),
        title: format!("{} {}", commit.short_sha(), commit.message),
    });
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::CommitFiles, &mut effects);
    effects.push(UiEffect::LoadCommitFiles {
        task,
        path,
        sha: commit.sha,
    });
    effects
}

pub fn on_commit_files_loaded(
    app: &mut AppState,
    sha: &str,
    result: Result<Vec<lwt_core::models::CommitFile>, String>,
) {
    if let Some(Screen::CommitFiles(state)) = app.screens.active_mut()
        && state.sha == sha
    {
        state.set_files(result);
    }
}

pub fn show_commit_file_diff(
    app: &mut AppState,
    path: PathBuf,
    sha: String,
    file: String,
) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Diff, &mut effects);
    effects.push(UiEffect::LoadCommitFileDiff {
        task,
        path,
        sha,
        file,
    });
    effects
}

// ============================================================================
// Shell
// ============================================================================

/// `!`: prompt for a command to run in the selected worktree.
pub fn open_shell(app: &mut AppState) -> Vec<UiEffect> {
    let Some(wt) = app.tui.selected_worktree() else {
        return Vec::new();
    };
    let title = format!("Run in {}", wt.name());
    let path = wt.path.clone();
    app.open_screen(ScreenRequest::Input {
        title,
        purpose: InputPurpose::RunShell { path },
        initial: String::new(),
    });
    Vec::new()
}

pub fn run_shell(app: &mut AppState, path: PathBuf, command: String) -> Vec<UiEffect> {
    if command.is_empty() {
        set_input_error(app, "Command cannot be empty.".to_string());
        return Vec::new();
    }
    remember_command(&mut app.tui.command_history, &command);
    show_loading(app, format!("Running {command}…"));

    let mut effects = vec![UiEffect::PushCommandHistory {
        command: command.clone(),
    }];
    let task = app.tui.begin_task(TaskKind::Shell, &mut effects);
    effects.push(UiEffect::RunShell {
        task,
        path,
        command,
    });
    effects
}

/// Newest first, without duplicates.
fn remember_command(history: &mut Vec<String>, command: &str) {
    history.retain(|c| c != command);
    history.insert(0, command.to_string());
    history.truncate(COMMAND_HISTORY_LIMIT);
}

/// Shows the output; the command may have changed anything, so everything
/// reloads.
pub fn on_shell_finished(
    app: &mut AppState,
    command: &str,
    result: Result<String, String>,
) -> Vec<UiEffect> {
    hide_loading(app);
    match result {
        Ok(output) if output.trim().is_empty() => {
            app.show_info(format!("$ {command}\n\n(no output)"));
        }
        Ok(output) => app.show_info(format!("$ {command}\n\n{}", output.trim_end())),
        Err(error) => app.show_info(format!("Error: {error}")),
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
    use crate::details_cache::{DetailsCache, DetailsSnapshot};
    use crate::screens::ScreenKind;
    use crate::state::Pane;

    const STATUS: &str = "\
1 M. N... 100644 100644 100644 abc abc src/staged.rs
1 .M N... 100644 100644 100644 abc abc src/unstaged.rs
? notes.txt
";

    fn app() -> AppState {
        let mut app = AppState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        app.tui.worktrees = vec![WorktreeInfo::new("/wt/a", "a")];
        app.tui.refresh_visible();
        let snapshot = DetailsSnapshot {
            status: STATUS.to_string(),
            log: "0123456789abcdef\tJane\tInitial commit\n".to_string(),
            ..DetailsSnapshot::default()
        };
        assert!(app.tui.apply_details(Path::new("/wt/a"), &snapshot));
        app.tui.focus = Pane::Status;
        app
    }

    fn select_file(app: &mut AppState, name: &str) {
        let idx = app
            .tui
            .status_rows()
            .iter()
            .position(|row| matches!(row, StatusRow::File { file, .. } if file.path == name))
            .unwrap();
        app.tui.status_selected = idx;
    }

    #[test]
    fn test_stage_toggles_by_file_state() {
        let mut app = app();
        select_file(&mut app, "src/unstaged.rs");
        assert!(matches!(
            toggle_stage(&mut app).as_slice(),
            [UiEffect::StageFile { stage: true, .. }]
        ));
        select_file(&mut app, "src/staged.rs");
        assert!(matches!(
            toggle_stage(&mut app).as_slice(),
            [UiEffect::StageFile { stage: false, .. }]
        ));
    }

    #[test]
    fn test_discard_untracked_asks_first() {
        let mut app = app();
        select_file(&mut app, "notes.txt");
        confirm_discard(&mut app);
        match app.screens.active() {
            Some(Screen::Confirm(confirm)) => assert_eq!(
                confirm.action,
                ConfirmAction::DiscardFile {
                    path: PathBuf::from("/wt/a"),
                    file: "notes.txt".to_string(),
                    untracked: true,
                }
            ),
            _ => panic!("expected confirm"),
        }
    }

    #[test]
    fn test_directory_row_toggles_collapse() {
        let mut app = app();
        let idx = app
            .tui
            .status_rows()
            .iter()
            .position(|row| matches!(row, StatusRow::Dir { .. }))
            .unwrap();
        app.tui.status_selected = idx;
        let before = app.tui.status_rows().len();
        assert!(open_status_row(&mut app).is_empty());
        assert!(app.tui.status_rows().len() < before);
        open_status_row(&mut app);
        assert_eq!(app.tui.status_rows().len(), before);
    }

    #[test]
    fn test_file_row_opens_file_diff() {
        let mut app = app();
        select_file(&mut app, "src/staged.rs");
        let effects = open_status_row(&mut app);
        assert_eq!(app.screens.kind(), ScreenKind::Diff);
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::LoadDiff { scope: DiffScope::File(f), .. }] if f == "src/staged.rs"
        ));
    }

    #[test]
    fn test_commit_files_for_selected_commit() {
        let mut app = app();
        let effects = open_commit_files(&mut app);
        assert_eq!(app.screens.kind(), ScreenKind::CommitFiles);
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::LoadCommitFiles { sha, .. }] if sha == "0123456789abcdef"
        ));
    }

    #[test]
    fn test_shell_history_is_deduplicated() {
        let mut app = app();
        app.tui.command_history = vec!["ls".to_string(), "make".to_string()];
        let effects = run_shell(&mut app, PathBuf::from("/wt/a"), "make".to_string());
        assert_eq!(app.tui.command_history, vec!["make", "ls"]);
        assert!(matches!(effects.first(), Some(UiEffect::PushCommandHistory { .. })));
        assert!(matches!(effects.last(), Some(UiEffect::RunShell { .. })));
        assert_eq!(app.screens.kind(), ScreenKind::Loading);
    }

    #[test]
    fn test_shell_output_is_shown() {
        let mut app = app();
        let effects = on_shell_finished(&mut app, "echo hi", Ok("hi\n".to_string()));
        match app.screens.active() {
            Some(Screen::Info(info)) => assert_eq!(info.message, "$ echo hi\n\nhi"),
            _ => panic!("expected info"),
        }
        assert!(matches!(effects.as_slice(), [UiEffect::LoadWorktrees { .. }]));
    }
}
