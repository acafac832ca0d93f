//! Application state composition.
//!
//! ## State Hierarchy
//!
//! ```text
//! AppState
//! ├── tui: TuiState
//! │   ├── worktrees / visible / selected  (list pane)
//! │   ├── details: DetailsView            (status + log panes)
//! │   ├── filters, focus                  (per-pane view state)
//! │   ├── pending_operation               (trust gate)
//! │   ├── task_seq, tasks                 (task lifecycle state)
//! │   └── details_cache                   (shared with background tasks)
//! └── screens: ScreenStack                (modal screens)
//! ```
//!
//! State is split between `TuiState` and `ScreenStack` so screen handlers can
//! take `&mut self` while the reducer still reads `TuiState`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lwt_core::commands::CommandEnv;
use lwt_core::config::Config;
use lwt_core::git::RepoContext;
use lwt_core::models::{StatusFile, WorktreeInfo};
use lwt_core::persistence::PaletteUsage;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::common::{TaskId, TaskKind, TaskSeq, Tasks};
use crate::details_cache::{DetailsCache, DetailsSnapshot};
use crate::effects::UiEffect;
use crate::screens::{Screen, ScreenKind, ScreenRequest, ScreenStack};
use crate::trust_gate::PendingOperation;
use crate::views::{self, AnnotatedCommit, StatusRow};
use crate::watch::WatchThrottle;

// ============================================================================
// AppState (Combined State)
// ============================================================================

pub struct AppState {
    pub tui: TuiState,
    pub screens: ScreenStack,
}

impl AppState {
    pub fn new(config: Config, start_dir: PathBuf, cache: Arc<DetailsCache>) -> Self {
        Self {
            tui: TuiState::new(config, start_dir, cache),
            screens: ScreenStack::default(),
        }
    }

    /// Opens a screen, replacing whatever is open.
    pub fn open_screen(&mut self, request: ScreenRequest) {
        let Some(request) = self.yield_to_trust_prompt(request) else {
            return;
        };
        let screen = Screen::from_request(request, &self.tui);
        self.screens.open(screen);
    }

    /// Opens a screen on top of the current one.
    pub fn open_child_screen(&mut self, request: ScreenRequest) {
        let Some(request) = self.yield_to_trust_prompt(request) else {
            return;
        };
        let screen = Screen::from_request(request, &self.tui);
        self.screens.open_child(screen);
    }

    /// An open Trust prompt owns its pending operation, so it is only
    /// replaced by another prompt. Info and Loading text goes to the status
    /// bar instead; any other screen cancels the prompt's batch.
    fn yield_to_trust_prompt(&mut self, request: ScreenRequest) -> Option<ScreenRequest> {
        let prompting =
            self.screens.kind() == ScreenKind::Trust && self.tui.pending_operation.is_some();
        match request {
            ScreenRequest::Trust { .. } => Some(request),
            _ if !prompting => Some(request),
            ScreenRequest::Info { message } | ScreenRequest::Loading { message } => {
                debug!(%message, "trust prompt open; message routed to the status bar");
                self.tui.message = Some(message);
                None
            }
            request => {
                warn!("trust prompt replaced; cancelling its batch");
                self.tui.pending_operation = None;
                self.tui.message = Some("Cancelled.".to_string());
                Some(request)
            }
        }
    }

    pub fn show_info(&mut self, message: impl Into<String>) {
        self.open_screen(ScreenRequest::Info {
            message: message.into(),
        });
    }
}

// ============================================================================
// Panes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Worktrees,
    Status,
    Log,
}

impl Pane {
    pub fn next(self) -> Self {
        match self {
            Pane::Worktrees => Pane::Status,
            Pane::Status => Pane::Log,
            Pane::Log => Pane::Worktrees,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Pane::Worktrees => "Worktrees",
            Pane::Status => "Status",
            Pane::Log => "Log",
        }
    }
}

/// Filter text per pane.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub worktrees: String,
    pub status: String,
    pub log: String,
}

impl Filters {
    pub fn get(&self, pane: Pane) -> &str {
        match pane {
            Pane::Worktrees => &self.worktrees,
            Pane::Status => &self.status,
            Pane::Log => &self.log,
        }
    }

    pub fn get_mut(&mut self, pane: Pane) -> &mut String {
        match pane {
            Pane::Worktrees => &mut self.worktrees,
            Pane::Status => &mut self.status,
            Pane::Log => &mut self.log,
        }
    }
}

/// Status and log of the selected worktree, derived from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct DetailsView {
    pub path: Option<PathBuf>,
    pub files: Vec<StatusFile>,
    pub log: Vec<AnnotatedCommit>,
    /// Inline fetch error; retried on the next refresh.
    pub error: Option<String>,
}

impl DetailsView {
    pub fn from_snapshot(path: PathBuf, snapshot: &DetailsSnapshot) -> Self {
        Self {
            path: Some(path),
            files: lwt_core::models::parse_status_files(&snapshot.status),
            log: views::annotate_log(snapshot),
            error: None,
        }
    }
}

/// Progress of a prune batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneProgress {
    pub remaining: usize,
    pub pruned: usize,
    pub failed: usize,
}

// ============================================================================
// TuiState
// ============================================================================

pub struct TuiState {
    pub should_quit: bool,
    pub config: Config,
    /// Directory the session was started from; used for repository discovery.
    pub start_dir: PathBuf,
    pub repo: Option<RepoContext>,

    /// All worktrees, sorted by the active sort mode.
    pub worktrees: Vec<WorktreeInfo>,
    /// Indices into `worktrees` that pass the worktree filter.
    pub visible: Vec<usize>,
    /// Index into `visible`.
    pub selected: usize,
    pub main_branch: String,
    pub list_error: Option<String>,

    pub focus: Pane,
    pub filters: Filters,
    /// Pane whose filter is being edited.
    pub filter_editing: Option<Pane>,
    pub details: DetailsView,
    pub status_selected: usize,
    pub log_selected: usize,
    pub collapsed_dirs: HashSet<String>,

    /// Path to select once the next worktree list arrives.
    pub pending_select: Option<PathBuf>,
    pub pending_operation: Option<PendingOperation>,
    pub prune: Option<PruneProgress>,

    pub access_history: HashMap<String, i64>,
    pub command_history: Vec<String>,
    pub palette_history: Vec<PaletteUsage>,

    /// Worktree chosen with Enter; printed by the CLI after exit.
    pub selected_output: Option<PathBuf>,
    /// Transient status-bar message.
    pub message: Option<String>,
    pub spinner_frame: usize,
    pub last_refresh: Instant,
    pub watch_throttle: WatchThrottle,
    pub viewport: (u16, u16),

    pub task_seq: TaskSeq,
    pub tasks: Tasks,
    pub details_cache: Arc<DetailsCache>,
}

impl TuiState {
    pub fn new(config: Config, start_dir: PathBuf, cache: Arc<DetailsCache>) -> Self {
        Self {
            should_quit: false,
            config,
            start_dir,
            repo: None,
            worktrees: Vec::new(),
            visible: Vec::new(),
            selected: 0,
            main_branch: "main".to_string(),
            list_error: None,
            focus: Pane::default(),
            filters: Filters::default(),
            filter_editing: None,
            details: DetailsView::default(),
            status_selected: 0,
            log_selected: 0,
            collapsed_dirs: HashSet::new(),
            pending_select: None,
            pending_operation: None,
            prune: None,
            access_history: HashMap::new(),
            command_history: Vec::new(),
            palette_history: Vec::new(),
            selected_output: None,
            message: None,
            spinner_frame: 0,
            last_refresh: Instant::now(),
            watch_throttle: WatchThrottle::default(),
            viewport: (0, 0),
            task_seq: TaskSeq::default(),
            tasks: Tasks::default(),
            details_cache: cache,
        }
    }

    /// Allocates an id for a new task of `kind`.
    ///
    /// A running task of a recurring kind is superseded: its token is
    /// cancelled so the older result is dropped. One-shot kinds overlap.
    pub fn begin_task(&mut self, kind: TaskKind, effects: &mut Vec<UiEffect>) -> TaskId {
        let state = self.tasks.state(kind);
        if kind.is_recurring() && state.is_running() {
            effects.push(UiEffect::CancelTask {
                kind,
                token: state.cancel.clone(),
            });
        }
        self.task_seq.next_id()
    }

    pub fn selected_worktree(&self) -> Option<&WorktreeInfo> {
        self.visible
            .get(self.selected)
            .and_then(|&idx| self.worktrees.get(idx))
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected_worktree().map(|wt| wt.path.as_path())
    }

    pub fn main_worktree(&self) -> Option<&WorktreeInfo> {
        self.worktrees.iter().find(|wt| wt.is_main)
    }

    pub fn main_path(&self) -> Option<PathBuf> {
        self.main_worktree()
            .map(|wt| wt.path.clone())
            .or_else(|| self.repo.as_ref().map(|r| r.toplevel.clone()))
    }

    pub fn repo_name(&self) -> &str {
        self.repo.as_ref().map_or("", |r| r.repo_name.as_str())
    }

    /// Directory new worktrees are created in (`<worktree_dir>/<repo_key>`).
    pub fn repo_worktree_dir(&self) -> Option<PathBuf> {
        self.repo
            .as_ref()
            .map(|r| self.config.worktree_dir().join(&r.repo_key))
    }

    /// Variables injected into commands run for `wt`.
    pub fn worktree_env(&self, branch: &str, path: &Path) -> CommandEnv {
        let main = self.main_path().unwrap_or_else(|| path.to_path_buf());
        CommandEnv::for_worktree(branch, path, self.repo_name(), &main)
    }

    /// Recomputes `visible` from the filter, keeping the selected path.
    pub fn refresh_visible(&mut self) {
        let previous = self.selected_path().map(Path::to_path_buf);
        self.visible = self
            .worktrees
            .iter()
            .enumerate()
            .filter(|(_, wt)| views::worktree_matches(wt, &self.filters.worktrees))
            .map(|(idx, _)| idx)
            .collect();
        let paths: Vec<&Path> = self
            .visible
            .iter()
            .map(|&idx| self.worktrees[idx].path.as_path())
            .collect();
        self.selected = views::restore_selection(paths, previous.as_deref(), self.selected);
    }

    pub fn status_rows(&self) -> Vec<StatusRow> {
        views::build_status_rows(
            &self.details.files,
            &self.collapsed_dirs,
            &self.filters.status,
        )
    }

    pub fn log_rows(&self) -> Vec<&AnnotatedCommit> {
        self.details
            .log
            .iter()
            .filter(|c| views::matches_filter(&c.entry.message, &self.filters.log))
            .collect()
    }

    /// Applies a snapshot to the details panes if it is for the selection.
    pub fn apply_details(&mut self, path: &Path, snapshot: &DetailsSnapshot) -> bool {
        if self.selected_path() != Some(path) {
            return false;
        }
        let same_worktree = self.details.path.as_deref() == Some(path);
        self.details = DetailsView::from_snapshot(path.to_path_buf(), snapshot);
        if !same_worktree {
            self.status_selected = 0;
            self.log_selected = 0;
            self.collapsed_dirs.clear();
        }
        self.status_selected = views::clamp_index(self.status_selected, self.status_rows().len());
        self.log_selected = views::clamp_index(self.log_selected, self.log_rows().len());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(paths: &[(&str, &str)]) -> TuiState {
        let mut tui = TuiState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        tui.worktrees = paths
            .iter()
            .map(|(path, branch)| WorktreeInfo::new(*path, *branch))
            .collect();
        tui.refresh_visible();
        tui
    }

    #[test]
    fn test_filter_keeps_selected_path() {
        let mut tui = state_with(&[("/a", "alpha"), ("/b", "beta"), ("/c", "gamma")]);
        tui.selected = 2;
        tui.filters.worktrees = "a".to_string();
        tui.refresh_visible();
        // alpha, beta and gamma all contain "a"
        assert_eq!(tui.selected_path(), Some(Path::new("/c")));

        tui.filters.worktrees = "bet".to_string();
        tui.refresh_visible();
        assert_eq!(tui.visible.len(), 1);
        assert_eq!(tui.selected_path(), Some(Path::new("/b")));
    }

    #[test]
    fn test_begin_task_cancels_running_kind() {
        let mut tui = state_with(&[]);
        let mut effects = Vec::new();
        let first = tui.begin_task(TaskKind::Details, &mut effects);
        assert!(effects.is_empty());

        tui.tasks
            .state_mut(TaskKind::Details)
            .on_started(&crate::common::TaskStarted {
                id: first,
                cancel: Some(tokio_util::sync::CancellationToken::new()),
                meta: crate::common::TaskMeta::None,
            });
        let second = tui.begin_task(TaskKind::Details, &mut effects);
        assert_ne!(first, second);
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::CancelTask {
                kind: TaskKind::Details,
                token: Some(_)
            }]
        ));
    }

    #[test]
    fn test_apply_details_ignores_other_worktrees() {
        let mut tui = state_with(&[("/a", "alpha"), ("/b", "beta")]);
        let snapshot = DetailsSnapshot {
            status: "1 .M N... 100644 100644 100644 abc abc src/lib.rs\n".to_string(),
            ..DetailsSnapshot::default()
        };
        assert!(!tui.apply_details(Path::new("/b"), &snapshot));
        assert!(tui.apply_details(Path::new("/a"), &snapshot));
        assert_eq!(tui.details.files.len(), 1);
    }
}
