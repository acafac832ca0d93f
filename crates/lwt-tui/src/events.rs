//! UI event types.
//!
//! Every input to the reducer is a `UiEvent`: terminal input, timer ticks,
//! watch signals and the results of background tasks.
//!
//! ## Task Lifecycle Events
//!
//! - The runtime emits `UiEvent::TaskStarted` once a task is spawned
//! - The runtime emits `UiEvent::TaskCompleted` when it finishes; the result
//!   is `None` when the task was cancelled before delivering
//! - The reducer is the only place that mutates `TaskState`, and applies a
//!   completion only if it belongs to the latest task of its kind

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::event::Event as CrosstermEvent;
use lwt_core::git::RepositoryService;
use lwt_core::models::{CommitFile, Issue, PullRequest, WorktreeInfo};
use lwt_core::persistence::PaletteUsage;
use lwt_core::trust::TrustStatus;

use crate::common::{TaskCompleted, TaskKind, TaskStarted};
use crate::details_cache::DetailsSnapshot;
use crate::operations::upstream::UpstreamRequest;
use crate::operations::{BranchSource, CreateRequest, PruneCandidate, RenameRequest};
use crate::trust_gate::{Continuation, PendingOperation};

/// Shared handle to a connected repository.
#[derive(Clone)]
pub struct RepoHandle(pub Arc<dyn RepositoryService>);

impl fmt::Debug for RepoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RepoHandle")
            .field(&self.0.context().toplevel)
            .finish()
    }
}

/// Persisted session data loaded at startup.
#[derive(Debug, Default)]
pub struct SessionData {
    pub worktrees: Vec<WorktreeInfo>,
    pub access_history: HashMap<String, i64>,
    pub last_selected: Option<PathBuf>,
    pub command_history: Vec<String>,
    pub palette_history: Vec<PaletteUsage>,
}

/// Worktree list plus the branch used for merge checks.
#[derive(Debug, Clone)]
pub struct WorktreeListing {
    pub worktrees: Vec<WorktreeInfo>,
    pub main_branch: String,
}

#[derive(Debug)]
pub enum UiEvent {
    /// Timer tick (spinner, auto-refresh).
    Tick,

    /// Emitted once per frame with the terminal size.
    Frame { width: u16, height: u16 },

    /// Terminal input event (key, mouse, paste, resize).
    Terminal(CrosstermEvent),

    /// Task lifecycle: runtime started a task (cancel token optional).
    TaskStarted {
        kind: TaskKind,
        started: TaskStarted,
    },

    /// Task lifecycle: runtime completed a task.
    TaskCompleted {
        kind: TaskKind,
        completed: TaskCompleted<Option<Box<UiEvent>>>,
    },

    /// Repository metadata changed on disk.
    GitDirChanged,

    /// The debounce timer for a selection fired.
    DebouncedSelection { index: usize },

    RepositoryDiscovered {
        result: Result<RepoHandle, String>,
    },

    SessionLoaded(SessionData),

    WorktreesLoaded {
        result: Result<WorktreeListing, String>,
    },

    DetailsLoaded {
        path: PathBuf,
        result: Result<DetailsSnapshot, String>,
    },

    /// Trust status resolved for a pending command batch.
    TrustChecked {
        op: PendingOperation,
        result: Result<TrustStatus, String>,
    },

    /// A gated command batch finished; the continuation runs regardless.
    CommandsFinished {
        continuation: Continuation,
        error: Option<String>,
    },

    CreateValidated {
        request: CreateRequest,
        error: Option<String>,
    },

    RenameValidated {
        request: RenameRequest,
        error: Option<String>,
    },

    WorktreeCreated {
        request: CreateRequest,
        result: Result<(), String>,
    },

    WorktreeDeleted {
        path: PathBuf,
        branch: String,
        result: Result<(), String>,
    },

    BranchDeleted {
        branch: String,
        result: Result<(), String>,
    },

    WorktreeRenamed {
        request: RenameRequest,
        result: Result<(), String>,
    },

    WorktreeAbsorbed {
        path: PathBuf,
        branch: String,
        result: Result<(), String>,
    },

    /// Push or sync finished; `Ok` carries git's output.
    UpstreamUpdated {
        request: UpstreamRequest,
        result: Result<String, String>,
    },

    PruneCandidatesLoaded {
        result: Result<Vec<PruneCandidate>, String>,
    },

    /// One target of a prune batch finished.
    WorktreePruned {
        path: PathBuf,
        result: Result<(), String>,
    },

    /// Stage, unstage, discard or commit finished.
    FileOpFinished {
        path: PathBuf,
        result: Result<String, String>,
    },

    ShellFinished {
        path: PathBuf,
        command: String,
        result: Result<String, String>,
    },

    DiffLoaded {
        result: Result<String, String>,
    },

    CommitFilesLoaded {
        sha: String,
        result: Result<Vec<CommitFile>, String>,
    },

    PullRequestsLoaded {
        result: Result<Vec<PullRequest>, String>,
    },

    IssuesLoaded {
        result: Result<Vec<Issue>, String>,
    },

    BranchesLoaded {
        result: Result<Vec<String>, String>,
    },

    BranchNameSuggested { source: BranchSource, name: String },

    /// Generic task failure; shown on the Info screen.
    Error(String),
}
