//! TUI reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.
//!
//! Keys go to the active screen if there is one; the base view only sees
//! keys while no screen is open.

use std::path::{Path, PathBuf};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use lwt_core::persistence::{PALETTE_HISTORY_LIMIT, PaletteUsage};
use tracing::debug;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::operations::upstream::{self, UpstreamAction};
use crate::operations::{self, BranchSource, DiffScope, create, files, remove, rename};
use crate::screens::{
    ConfirmAction, InputPurpose, ScreenAction, ScreenRequest, ScreenTransition,
    palette::SHELL_COMMAND_PREFIX,
};
use crate::state::{AppState, Pane, TuiState};
use crate::{refresh, trust_gate, views};

/// Rows moved by PageUp / PageDown.
const PAGE_ROWS: isize = 10;

/// The main reducer function.
///
/// Takes the current state and an event, mutates state, and returns effects
/// for the runtime to execute.
pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => refresh::on_tick(&mut app.tui),
        UiEvent::Frame { width, height } => {
            app.tui.viewport = (width, height);
            vec![]
        }
        UiEvent::Terminal(term_event) => handle_terminal_event(app, term_event),
        UiEvent::TaskStarted { kind, started } => {
            app.tui.tasks.on_started(kind, &started);
            vec![]
        }
        UiEvent::TaskCompleted { kind, completed } => {
            let ok = app.tui.tasks.on_finished(kind, completed.id);
            match completed.result {
                Some(event) if ok => update(app, *event),
                _ => {
                    debug!(?kind, id = completed.id.0, "dropping superseded task result");
                    vec![]
                }
            }
        }
        UiEvent::GitDirChanged => refresh::on_git_dir_changed(&mut app.tui),
        UiEvent::DebouncedSelection { index } => refresh::on_debounced(&mut app.tui, index),

        UiEvent::RepositoryDiscovered { result } => refresh::on_repository_discovered(app, result),
        UiEvent::SessionLoaded(session) => refresh::on_session_loaded(app, session),
        UiEvent::WorktreesLoaded { result } => refresh::on_worktrees_loaded(app, result),
        UiEvent::DetailsLoaded { path, result } => {
            refresh::on_details_loaded(&mut app.tui, path, result);
            vec![]
        }

        UiEvent::TrustChecked { op, result } => trust_gate::on_checked(app, op, result),
        UiEvent::CommandsFinished {
            continuation,
            error,
        } => trust_gate::on_commands_finished(app, continuation, error),

        UiEvent::CreateValidated { request, error } => create::on_validated(app, request, error),
        UiEvent::WorktreeCreated { request, result } => create::on_created(app, request, result),
        UiEvent::RenameValidated { request, error } => rename::on_validated(app, request, error),
        UiEvent::WorktreeRenamed { request, result } => rename::on_renamed(app, request, result),
        UiEvent::WorktreeDeleted {
            path,
            branch,
            result,
        } => remove::on_deleted(app, path, branch, result),
        UiEvent::BranchDeleted { branch, result } => {
            remove::on_branch_deleted(app, &branch, result);
            vec![]
        }
        UiEvent::WorktreeAbsorbed {
            path,
            branch,
            result,
        } => remove::on_absorbed(app, path, branch, result),
        UiEvent::UpstreamUpdated { request, result } => upstream::on_updated(app, request, result),
        UiEvent::PruneCandidatesLoaded { result } => remove::on_prune_candidates(app, result),
        UiEvent::WorktreePruned { path, result } => remove::on_pruned(app, &path, result),

        UiEvent::FileOpFinished { path, result } => files::on_file_op_finished(app, &path, result),
        UiEvent::ShellFinished {
            command, result, ..
        } => files::on_shell_finished(app, &command, result),
        UiEvent::DiffLoaded { result } => {
            files::on_diff_loaded(app, result);
            vec![]
        }
        UiEvent::CommitFilesLoaded { sha, result } => {
            files::on_commit_files_loaded(app, &sha, result);
            vec![]
        }

        UiEvent::PullRequestsLoaded { result } => {
            create::on_pull_requests_loaded(app, result);
            vec![]
        }
        UiEvent::IssuesLoaded { result } => {
            create::on_issues_loaded(app, result);
            vec![]
        }
        UiEvent::BranchesLoaded { result } => {
            create::on_branches_loaded(app, result);
            vec![]
        }
        UiEvent::BranchNameSuggested { source, name } => {
            create::on_branch_name_suggested(app, source, name);
            vec![]
        }

        UiEvent::Error(message) => {
            operations::hide_loading(app);
            app.show_info(format!("Error: {message}"));
            vec![]
        }
    }
}

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(app, key),
        Event::Resize(width, height) => {
            app.tui.viewport = (width, height);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if app.screens.is_open() {
        return handle_screen_key(app, key);
    }
    app.tui.message = None;
    if let Some(pane) = app.tui.filter_editing {
        return handle_filter_key(&mut app.tui, pane, key);
    }
    handle_base_key(app, key)
}

// ============================================================================
// Screens
// ============================================================================

fn handle_screen_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let Some(screen) = app.screens.active_mut() else {
        return vec![];
    };
    let screen_update = screen.handle_key(key);

    match screen_update.transition {
        ScreenTransition::Stay => {}
        ScreenTransition::Close => app.screens.close(),
        ScreenTransition::Cancel => app.screens.cancel(),
        ScreenTransition::Open(request) => app.open_screen(request),
        ScreenTransition::OpenChild(request) => app.open_child_screen(request),
    }

    let mut effects = Vec::new();
    for action in screen_update.actions {
        effects.extend(apply_screen_action(app, action));
    }
    effects
}

fn apply_screen_action(app: &mut AppState, action: ScreenAction) -> Vec<UiEffect> {
    match action {
        ScreenAction::Confirm(confirmed) => match confirmed {
            ConfirmAction::DeleteWorktree { path, branch } => {
                remove::on_delete_confirmed(app, path, branch)
            }
            ConfirmAction::DeleteBranch { branch } => {
                remove::on_delete_branch_confirmed(app, branch)
            }
            ConfirmAction::Absorb { worktree } => remove::on_absorb_confirmed(app, worktree),
            ConfirmAction::DiscardFile {
                path,
                file,
                untracked,
            } => files::on_discard_confirmed(app, path, file, untracked),
        },
        ScreenAction::SubmitInput { purpose, value } => match purpose {
            InputPurpose::CreateBranch { source } => create::submit(app, source, value),
            InputPurpose::Rename { path, branch } => rename::submit(app, path, branch, value),
            InputPurpose::RunShell { path } => files::run_shell(app, path, value),
            InputPurpose::SetUpstream {
                action,
                path,
                branch,
            } => upstream::submit(app, action, path, branch, value),
        },
        ScreenAction::ResolveTrust(resolution) => trust_gate::resolve(app, resolution),
        ScreenAction::Retry => {
            if app.tui.repo.is_some() {
                refresh::reload_worktrees(&mut app.tui)
            } else {
                refresh::discover_repository(&mut app.tui)
            }
        }
        ScreenAction::Quit => quit(&app.tui),
        ScreenAction::Commit { path, message } => files::commit(app, path, message),
        ScreenAction::ShowStagedDiff { path } => files::load_diff(app, path, DiffScope::Staged),
        ScreenAction::RunPalette(id) => {
            remember_palette_use(&mut app.tui.palette_history, &id, chrono::Utc::now().timestamp());
            let mut effects = vec![UiEffect::RecordPaletteUse { id: id.clone() }];
            effects.extend(run_action(app, &id));
            effects
        }
        ScreenAction::SelectPr(pr) => create::suggest_branch_name(app, BranchSource::PullRequest(pr)),
        ScreenAction::SelectIssue(issue) => {
            create::suggest_branch_name(app, BranchSource::Issue(issue))
        }
        ScreenAction::ShowCommitFileDiff { path, sha, file } => {
            files::show_commit_file_diff(app, path, sha, file)
        }
        ScreenAction::Prune(candidates) => remove::on_prune_submitted(app, candidates),
    }
}

/// Mirrors what the store persists, so the palette ranks correctly before
/// the next load.
fn remember_palette_use(history: &mut Vec<PaletteUsage>, id: &str, now: i64) {
    let count = match history.iter().position(|u| u.id == id) {
        Some(idx) => history.remove(idx).count + 1,
        None => 1,
    };
    history.insert(
        0,
        PaletteUsage {
            id: id.to_string(),
            timestamp: now,
            count,
        },
    );
    history.truncate(PALETTE_HISTORY_LIMIT);
}

// ============================================================================
// Base view
// ============================================================================

/// Runs a named action; shared by the base keys and the palette.
fn run_action(app: &mut AppState, id: &str) -> Vec<UiEffect> {
    if let Some(command) = id.strip_prefix(SHELL_COMMAND_PREFIX) {
        let Some(path) = app.tui.selected_path().map(Path::to_path_buf) else {
            return vec![];
        };
        return files::run_shell(app, path, command.to_string());
    }
    match id {
        "refresh" => {
            app.tui.message = Some("Refreshing…".to_string());
            refresh::reload_worktrees(&mut app.tui)
        }
        "create" => create::open_branch_picker(app),
        "pr" => create::open_pr_picker(app),
        "issue" => create::open_issue_picker(app),
        "delete" => remove::confirm_delete(app),
        "rename" => rename::open(app),
        "absorb" => remove::confirm_absorb(app),
        "push" => upstream::start(app, UpstreamAction::Push),
        "sync" => upstream::start(app, UpstreamAction::Sync),
        "prune" => remove::scan_prune(app),
        "commit" => files::open_commit(app),
        "diff" => files::show_diff(app, DiffScope::All),
        "shell" => files::open_shell(app),
        "sort" => refresh::cycle_sort(&mut app.tui),
        "help" => {
            app.open_screen(ScreenRequest::Help);
            vec![]
        }
        "quit" => quit(&app.tui),
        other => {
            debug!(id = other, "unknown action");
            vec![]
        }
    }
}

fn handle_base_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return quit(&app.tui),
        KeyCode::Char('p') if ctrl => {
            app.open_screen(ScreenRequest::Palette);
            return vec![];
        }
        KeyCode::Tab => {
            app.tui.focus = app.tui.focus.next();
            return vec![];
        }
        KeyCode::Char('/' | 'f') => {
            app.tui.filter_editing = Some(app.tui.focus);
            return vec![];
        }
        KeyCode::Esc => {
            let pane = app.tui.focus;
            if !app.tui.filters.get(pane).is_empty() {
                app.tui.filters.get_mut(pane).clear();
                return filter_changed(&mut app.tui, pane);
            }
            return vec![];
        }
        _ => {}
    }

    if let Some(delta) = navigation_delta(key.code) {
        return match app.tui.focus {
            Pane::Worktrees => refresh::move_selection(&mut app.tui, delta),
            Pane::Status => {
                let len = app.tui.status_rows().len();
                app.tui.status_selected = step(app.tui.status_selected, delta, len);
                vec![]
            }
            Pane::Log => {
                let len = app.tui.log_rows().len();
                app.tui.log_selected = step(app.tui.log_selected, delta, len);
                vec![]
            }
        };
    }

    match (app.tui.focus, key.code) {
        (Pane::Worktrees, KeyCode::Enter) => return switch_to_selected(&mut app.tui),
        (Pane::Status, KeyCode::Char(' ')) => return files::toggle_stage(app),
        (Pane::Status, KeyCode::Char('d')) => return files::confirm_discard(app),
        (Pane::Status, KeyCode::Enter) => return files::open_status_row(app),
        (Pane::Log, KeyCode::Enter) => return files::open_commit_files(app),
        _ => {}
    }

    let action = match key.code {
        KeyCode::Char('r') => "refresh",
        KeyCode::Char('c') => "create",
        KeyCode::Char('p') => "pr",
        KeyCode::Char('i') => "issue",
        KeyCode::Char('D') => "delete",
        KeyCode::Char('m') => "rename",
        KeyCode::Char('A') => "absorb",
        KeyCode::Char('P') => "push",
        KeyCode::Char('S') => "sync",
        KeyCode::Char('X') => "prune",
        KeyCode::Char('C') => "commit",
        KeyCode::Char('!') => "shell",
        KeyCode::Char('s') => "sort",
        KeyCode::Char('?') => "help",
        KeyCode::Char('q') => "quit",
        _ => return vec![],
    };
    run_action(app, action)
}

fn navigation_delta(code: KeyCode) -> Option<isize> {
    match code {
        KeyCode::Char('j') | KeyCode::Down => Some(1),
        KeyCode::Char('k') | KeyCode::Up => Some(-1),
        KeyCode::PageDown => Some(PAGE_ROWS),
        KeyCode::PageUp => Some(-PAGE_ROWS),
        KeyCode::Char('G') | KeyCode::End => Some(isize::MAX),
        KeyCode::Char('g') | KeyCode::Home => Some(isize::MIN),
        _ => None,
    }
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    views::clamp_index(current.saturating_add_signed(delta), len)
}

/// Flushes access history and exits.
fn quit(tui: &TuiState) -> Vec<UiEffect> {
    vec![
        UiEffect::SaveAccessHistory {
            history: tui.access_history.clone(),
        },
        UiEffect::Quit,
    ]
}

/// Enter on a worktree: remember the switch, hand the path to the caller
/// and exit.
fn switch_to_selected(tui: &mut TuiState) -> Vec<UiEffect> {
    let Some(path) = tui.selected_path().map(Path::to_path_buf) else {
        return vec![];
    };
    tui.access_history.insert(
        path.to_string_lossy().into_owned(),
        chrono::Utc::now().timestamp(),
    );
    tui.selected_output = Some(path.clone());
    vec![
        UiEffect::SaveAccessHistory {
            history: tui.access_history.clone(),
        },
        UiEffect::SaveLastSelected { path },
        UiEffect::Quit,
    ]
}

// ============================================================================
// Filters
// ============================================================================

fn handle_filter_key(tui: &mut TuiState, pane: Pane, key: KeyEvent) -> Vec<UiEffect> {
    match key.code {
        KeyCode::Enter => {
            tui.filter_editing = None;
            vec![]
        }
        KeyCode::Esc => {
            tui.filter_editing = None;
            tui.filters.get_mut(pane).clear();
            filter_changed(tui, pane)
        }
        KeyCode::Backspace => {
            if tui.filters.get_mut(pane).pop().is_none() {
                return vec![];
            }
            filter_changed(tui, pane)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            tui.filters.get_mut(pane).clear();
            filter_changed(tui, pane)
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            tui.filters.get_mut(pane).push(c);
            filter_changed(tui, pane)
        }
        _ => vec![],
    }
}

/// Re-derives the filtered view. A new worktree selection goes through the
/// debounce like any other navigation.
fn filter_changed(tui: &mut TuiState, pane: Pane) -> Vec<UiEffect> {
    match pane {
        Pane::Worktrees => {
            let before: Option<PathBuf> = tui.selected_path().map(Path::to_path_buf);
            tui.refresh_visible();
            if tui.selected_path() == before.as_deref() {
                return vec![];
            }
            if tui.visible.is_empty() {
                return vec![];
            }
            crate::debounce::schedule(tui)
        }
        Pane::Status => {
            tui.status_selected = views::clamp_index(tui.status_selected, tui.status_rows().len());
            vec![]
        }
        Pane::Log => {
            tui.log_selected = views::clamp_index(tui.log_selected, tui.log_rows().len());
            vec![]
        }
    }
}
