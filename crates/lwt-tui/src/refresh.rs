//! Worktree list and details refresh.
//!
//! The list reloads on explicit requests, after mutating operations, on
//! metadata changes (rate limited by [`WatchThrottle`](crate::watch::WatchThrottle))
//! and on the periodic tick. Details for the selection go through the
//! shared cache, so a fresh entry is applied without a task.

use std::path::{Path, PathBuf};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::common::TaskKind;
use crate::debounce;
use crate::details_cache::DetailsSnapshot;
use crate::effects::UiEffect;
use crate::events::{RepoHandle, SessionData, WorktreeListing};
use crate::screens::{ScreenKind, ScreenRequest};
use crate::state::{AppState, TuiState};
use crate::views;

// ============================================================================
// Session
// ============================================================================

pub fn discover_repository(tui: &mut TuiState) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = tui.begin_task(TaskKind::WorktreeList, &mut effects);
    effects.push(UiEffect::DiscoverRepository { task });
    effects
}

/// Attaches the repository, restores the session and loads the list.
pub fn on_repository_discovered(
    app: &mut AppState,
    result: Result<RepoHandle, String>,
) -> Vec<UiEffect> {
    match result {
        Ok(handle) => {
            app.tui.repo = Some(handle.0.context().clone());
            app.tui.list_error = None;
            app.screens.close_if(ScreenKind::Welcome);
            let mut effects = vec![UiEffect::AttachRepository { repo: handle }, UiEffect::LoadSession];
            effects.extend(reload_worktrees(&mut app.tui));
            effects
        }
        Err(error) => {
            warn!(%error, "repository discovery failed");
            app.open_screen(ScreenRequest::Welcome { error: Some(error) });
            Vec::new()
        }
    }
}

/// Shows the cached list until the live one arrives.
pub fn on_session_loaded(app: &mut AppState, session: SessionData) -> Vec<UiEffect> {
    let tui = &mut app.tui;
    tui.access_history = session.access_history;
    tui.command_history = session.command_history;
    tui.palette_history = session.palette_history;
    if tui.pending_select.is_none() {
        tui.pending_select = session.last_selected;
    }
    if !tui.worktrees.is_empty() || session.worktrees.is_empty() {
        return Vec::new();
    }

    debug!(count = session.worktrees.len(), "showing cached worktrees");
    tui.worktrees = session.worktrees;
    apply_access_history(tui);
    views::sort_worktrees(&mut tui.worktrees, tui.config.sort_mode);
    tui.refresh_visible();
    if let Some(path) = tui.pending_select.clone() {
        select_path(tui, &path);
    }
    Vec::new()
}

// ============================================================================
// Worktree list
// ============================================================================

pub fn reload_worktrees(tui: &mut TuiState) -> Vec<UiEffect> {
    if tui.repo.is_none() {
        return Vec::new();
    }
    let mut effects = Vec::new();
    let task = tui.begin_task(TaskKind::WorktreeList, &mut effects);
    effects.push(UiEffect::LoadWorktrees { task });
    effects
}

pub fn on_worktrees_loaded(
    app: &mut AppState,
    result: Result<WorktreeListing, String>,
) -> Vec<UiEffect> {
    let listing = match result {
        Ok(listing) => listing,
        Err(error) => {
            warn!(%error, "failed to list worktrees");
            app.tui.list_error = Some(error.clone());
            if app.tui.worktrees.is_empty() {
                app.open_screen(ScreenRequest::Welcome { error: Some(error) });
            }
            return Vec::new();
        }
    };

    let tui = &mut app.tui;
    tui.last_refresh = Instant::now();
    tui.list_error = None;
    tui.main_branch = listing.main_branch;

    let previous = tui
        .pending_select
        .take()
        .or_else(|| tui.selected_path().map(Path::to_path_buf));
    tui.worktrees = listing.worktrees;
    apply_access_history(tui);
    views::sort_worktrees(&mut tui.worktrees, tui.config.sort_mode);
    tui.details_cache.reset();
    tui.refresh_visible();
    if let Some(path) = previous {
        select_path(tui, &path);
    }

    if tui.worktrees.is_empty() {
        app.open_screen(ScreenRequest::Welcome { error: None });
        return Vec::new();
    }
    app.screens.close_if(ScreenKind::Welcome);

    let mut effects = vec![UiEffect::SaveWorktreeCache {
        worktrees: app.tui.worktrees.clone(),
    }];
    effects.extend(request_details(&mut app.tui));
    effects
}

fn apply_access_history(tui: &mut TuiState) {
    for wt in &mut tui.worktrees {
        let key = wt.path.to_string_lossy();
        wt.last_switched_ts = tui.access_history.get(key.as_ref()).copied().unwrap_or(0);
    }
}

/// Selects `path` if it is visible; the selection is unchanged otherwise.
pub fn select_path(tui: &mut TuiState, path: &Path) -> bool {
    match tui
        .visible
        .iter()
        .position(|&idx| tui.worktrees[idx].path == path)
    {
        Some(pos) => {
            tui.selected = pos;
            true
        }
        None => false,
    }
}

/// `s`: next sort mode, persisted to the config file.
pub fn cycle_sort(tui: &mut TuiState) -> Vec<UiEffect> {
    let mode = tui.config.sort_mode.next();
    tui.config.sort_mode = mode;
    views::sort_worktrees(&mut tui.worktrees, mode);
    tui.refresh_visible();
    tui.message = Some(format!("Sort: {}", mode.as_str()));
    vec![UiEffect::PersistSortMode { mode }]
}

// ============================================================================
// Details
// ============================================================================

/// Shows details for the selection, fetching only when the cache is stale.
pub fn request_details(tui: &mut TuiState) -> Vec<UiEffect> {
    let Some(path) = tui.selected_path().map(Path::to_path_buf) else {
        tui.details = Default::default();
        return Vec::new();
    };
    if let Some(snapshot) = tui.details_cache.get_fresh(&path) {
        tui.apply_details(&path, &snapshot);
        return Vec::new();
    }
    let mut effects = Vec::new();
    let task = tui.begin_task(TaskKind::Details, &mut effects);
    effects.push(UiEffect::LoadDetails {
        task,
        path,
        main_branch: tui.main_branch.clone(),
    });
    effects
}

pub fn on_details_loaded(tui: &mut TuiState, path: PathBuf, result: Result<DetailsSnapshot, String>) {
    match result {
        Ok(snapshot) => {
            if !tui.apply_details(&path, &snapshot) {
                debug!(path = %path.display(), "dropping details for a deselected worktree");
            }
        }
        Err(error) => {
            if tui.selected_path() == Some(path.as_path()) {
                tui.details.path = Some(path);
                tui.details.error = Some(error);
            }
        }
    }
}

/// Moves the selection by `delta` rows and restarts the debounce timer.
pub fn move_selection(tui: &mut TuiState, delta: isize) -> Vec<UiEffect> {
    if tui.visible.is_empty() {
        return Vec::new();
    }
    let next = tui.selected.saturating_add_signed(delta);
    let next = views::clamp_index(next, tui.visible.len());
    if next == tui.selected {
        return Vec::new();
    }
    tui.selected = next;
    debounce::schedule(tui)
}

pub fn on_debounced(tui: &mut TuiState, index: usize) -> Vec<UiEffect> {
    if !debounce::is_current(tui, index) {
        debug!(index, "stale debounce");
        return Vec::new();
    }
    request_details(tui)
}

// ============================================================================
// Timers
// ============================================================================

pub fn on_git_dir_changed(tui: &mut TuiState) -> Vec<UiEffect> {
    if !tui.watch_throttle.should_refresh(Instant::now()) {
        return Vec::new();
    }
    reload_worktrees(tui)
}

pub fn on_tick(tui: &mut TuiState) -> Vec<UiEffect> {
    tui.spinner_frame = tui.spinner_frame.wrapping_add(1);
    if !tui.config.auto_refresh
        || tui.repo.is_none()
        || tui.tasks.state(TaskKind::WorktreeList).is_running()
    {
        return Vec::new();
    }
    if tui.last_refresh.elapsed() < tui.config.refresh_interval() {
        return Vec::new();
    }
    tui.last_refresh = Instant::now();
    reload_worktrees(tui)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lwt_core::config::{Config, SortMode};
    use lwt_core::git::RepoContext;
    use lwt_core::models::WorktreeInfo;

    use super::*;
    use crate::details_cache::DetailsCache;
    use crate::screens::ScreenKind;

    fn app() -> AppState {
        let mut app = AppState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        app.tui.repo = Some(RepoContext {
            toplevel: PathBuf::from("/repo"),
            common_dir: PathBuf::from("/repo/.git"),
            repo_name: "repo".to_string(),
            repo_key: "acme/repo".to_string(),
        });
        app
    }

    fn listing(paths: &[&str]) -> WorktreeListing {
        WorktreeListing {
            worktrees: paths
                .iter()
                .map(|p| WorktreeInfo::new(*p, p.trim_start_matches("/wt/")))
                .collect(),
            main_branch: "main".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_selected_path() {
        let mut app = app();
        on_worktrees_loaded(&mut app, Ok(listing(&["/wt/a", "/wt/b", "/wt/c"])));
        app.tui.selected = 2;

        let effects = on_worktrees_loaded(&mut app, Ok(listing(&["/wt/0", "/wt/c", "/wt/d"])));
        assert_eq!(app.tui.selected_path(), Some(Path::new("/wt/c")));
        assert!(matches!(effects.first(), Some(UiEffect::SaveWorktreeCache { .. })));
        assert!(matches!(
            effects.last(),
            Some(UiEffect::LoadDetails { path, .. }) if path == Path::new("/wt/c")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_select_wins_over_current() {
        let mut app = app();
        on_worktrees_loaded(&mut app, Ok(listing(&["/wt/a", "/wt/b"])));
        app.tui.pending_select = Some(PathBuf::from("/wt/new"));
        on_worktrees_loaded(&mut app, Ok(listing(&["/wt/a", "/wt/b", "/wt/new"])));
        assert_eq!(app.tui.selected_path(), Some(Path::new("/wt/new")));
        assert!(app.tui.pending_select.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_opens_welcome() {
        let mut app = app();
        let effects = on_worktrees_loaded(&mut app, Ok(listing(&[])));
        assert!(effects.is_empty());
        assert_eq!(app.screens.kind(), ScreenKind::Welcome);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_error_keeps_previous_list() {
        let mut app = app();
        on_worktrees_loaded(&mut app, Ok(listing(&["/wt/a"])));
        on_worktrees_loaded(&mut app, Err("git exploded".to_string()));
        assert_eq!(app.tui.worktrees.len(), 1);
        assert_eq!(app.tui.list_error.as_deref(), Some("git exploded"));
        assert_eq!(app.screens.kind(), ScreenKind::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_entry_skips_fetch() {
        let mut app = app();
        app.tui.details_cache.insert(
            PathBuf::from("/wt/a"),
            DetailsSnapshot {
                status: "? notes.txt\n".to_string(),
                ..DetailsSnapshot::default()
            },
        );
        app.tui.worktrees = listing(&["/wt/a"]).worktrees;
        app.tui.refresh_visible();

        assert!(request_details(&mut app.tui).is_empty());
        assert_eq!(app.tui.details.files.len(), 1);
    }

    #[test]
    fn test_details_for_deselected_worktree_are_dropped() {
        let mut app = app();
        app.tui.worktrees = listing(&["/wt/a", "/wt/b"]).worktrees;
        app.tui.refresh_visible();
        on_details_loaded(&mut app.tui, PathBuf::from("/wt/b"), Err("boom".to_string()));
        assert!(app.tui.details.error.is_none());
        on_details_loaded(&mut app.tui, PathBuf::from("/wt/a"), Err("boom".to_string()));
        assert_eq!(app.tui.details.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_access_history_feeds_switched_sort() {
        let mut app = app();
        app.tui.config.sort_mode = SortMode::Switched;
        app.tui.access_history.insert("/wt/b".to_string(), 200);
        app.tui.access_history.insert("/wt/a".to_string(), 100);
        app.tui.worktrees = listing(&["/wt/a", "/wt/b"]).worktrees;
        apply_access_history(&mut app.tui);
        views::sort_worktrees(&mut app.tui.worktrees, app.tui.config.sort_mode);
        assert_eq!(app.tui.worktrees[0].path, Path::new("/wt/b"));
    }

    #[test]
    fn test_cycle_sort_persists_mode() {
        let mut app = app();
        let effects = cycle_sort(&mut app.tui);
        assert_eq!(app.tui.config.sort_mode, SortMode::Active);
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::PersistSortMode { mode: SortMode::Active }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_refreshes_after_interval() {
        let mut app = app();
        app.tui.last_refresh = Instant::now();
        assert!(on_tick(&mut app.tui).is_empty());

        tokio::time::advance(app.tui.config.refresh_interval() + Duration::from_millis(1)).await;
        assert!(matches!(
            on_tick(&mut app.tui).as_slice(),
            [UiEffect::LoadWorktrees { .. }]
        ));
        assert_eq!(app.tui.spinner_frame, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_without_auto_refresh_only_spins() {
        let mut app = app();
        app.tui.config.auto_refresh = false;
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(on_tick(&mut app.tui).is_empty());
        assert_eq!(app.tui.spinner_frame, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_refreshes_are_rate_limited() {
        let mut app = app();
        assert_eq!(on_git_dir_changed(&mut app.tui).len(), 1);
        assert!(on_git_dir_changed(&mut app.tui).is_empty());
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(on_git_dir_changed(&mut app.tui).len(), 1);
    }
}
