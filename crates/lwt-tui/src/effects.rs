//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They represent I/O and task spawning only (no direct UI mutations).
//!
//! ## Cancellation Effects
//!
//! Starting a task of a kind that is already running first emits
//! `UiEffect::CancelTask` with the older token. The runtime executes it by
//! calling `token.cancel()`; the older task's result is then dropped.

use std::collections::HashMap;
use std::path::PathBuf;

use lwt_core::config::SortMode;
use lwt_core::models::WorktreeInfo;
use tokio_util::sync::CancellationToken;

use crate::common::{TaskId, TaskKind};
use crate::events::RepoHandle;
use crate::operations::upstream::UpstreamRequest;
use crate::operations::{BranchSource, CreateRequest, DiffScope, RenameRequest};
use crate::trust_gate::{PendingOperation, PruneTarget};

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug)]
pub enum UiEffect {
    /// Quit the application.
    Quit,

    // ========================================================================
    // Session
    // ========================================================================
    /// Resolve the repository from the start directory.
    DiscoverRepository { task: TaskId },

    /// Install a connected repository and start watching its metadata.
    AttachRepository { repo: RepoHandle },

    /// Load cached worktrees and histories for the attached repository.
    LoadSession,

    SaveWorktreeCache { worktrees: Vec<WorktreeInfo> },
    SaveAccessHistory { history: HashMap<String, i64> },
    SaveLastSelected { path: PathBuf },
    PushCommandHistory { command: String },
    RecordPaletteUse { id: String },
    PersistSortMode { mode: SortMode },

    // ========================================================================
    // Queries
    // ========================================================================
    LoadWorktrees { task: TaskId },

    /// Fixed-delay timer that reports the selection it was started for.
    ScheduleDebounce { task: TaskId, index: usize },

    LoadDetails {
        task: TaskId,
        path: PathBuf,
        main_branch: String,
    },

    LoadBranches { task: TaskId },
    LoadPullRequests { task: TaskId },
    LoadIssues { task: TaskId },

    LoadDiff {
        task: TaskId,
        path: PathBuf,
        scope: DiffScope,
    },

    LoadCommitFiles {
        task: TaskId,
        path: PathBuf,
        sha: String,
    },

    LoadCommitFileDiff {
        task: TaskId,
        path: PathBuf,
        sha: String,
        file: String,
    },

    ScanPruneCandidates { task: TaskId, main_branch: String },

    /// Run the branch-name script (or fall back to the default name).
    SuggestBranchName {
        task: TaskId,
        source: BranchSource,
        suggested: String,
    },

    // ========================================================================
    // Trust-gated commands
    // ========================================================================
    CheckTrust { task: TaskId, op: PendingOperation },

    /// Record the user's decision for a trust subject.
    RecordTrust { path: PathBuf, blocked: bool },

    /// Execute an approved batch, then deliver its continuation.
    RunCommands { task: TaskId, op: PendingOperation },

    // ========================================================================
    // Worktree operations
    // ========================================================================
    ValidateCreate { task: TaskId, request: CreateRequest },
    CreateWorktree { task: TaskId, request: CreateRequest },

    DeleteWorktree {
        task: TaskId,
        path: PathBuf,
        branch: String,
    },

    DeleteBranch { task: TaskId, branch: String },

    ValidateRename { task: TaskId, request: RenameRequest },
    RenameWorktree { task: TaskId, request: RenameRequest },

    AbsorbWorktree {
        task: TaskId,
        worktree: WorktreeInfo,
        main_path: PathBuf,
        main_branch: String,
    },

    /// Push, or pull then push, one worktree's branch.
    UpdateUpstream {
        task: TaskId,
        request: UpstreamRequest,
    },

    /// One member of a prune batch. Not tracked per kind: every target
    /// delivers its own result.
    PruneWorktree {
        target: PruneTarget,
        commands: Vec<String>,
    },

    // ========================================================================
    // File operations
    // ========================================================================
    StageFile {
        task: TaskId,
        path: PathBuf,
        file: String,
        stage: bool,
    },

    DiscardFile {
        task: TaskId,
        path: PathBuf,
        file: String,
        untracked: bool,
    },

    Commit {
        task: TaskId,
        path: PathBuf,
        message: String,
    },

    RunShell {
        task: TaskId,
        path: PathBuf,
        command: String,
    },

    // ========================================================================
    // Cancellation Effects
    // ========================================================================
    /// Cancel an in-progress task.
    CancelTask {
        kind: TaskKind,
        token: Option<CancellationToken>,
    },
}
