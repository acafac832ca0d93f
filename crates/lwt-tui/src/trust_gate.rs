//! Trust gate for repository-declared commands.
//!
//! Init and terminate commands come partly from the repository's `.wt`
//! file, so running them is a trust decision. The gate resolves the command
//! list and the file's trust status in a background task, then applies the
//! configured mode:
//!
//! - `always`: run, no prompt
//! - `never`: skip, continuation still runs
//! - `ask`: run if trusted, skip if blocked, otherwise park the batch as the
//!   single [`PendingOperation`] and open the Trust screen
//!
//! Every resolution clears the pending operation. Only `Cancel` drops the
//! continuation.

use std::path::PathBuf;

use lwt_core::commands::CommandEnv;
use lwt_core::config::TrustMode;
use lwt_core::trust::TrustStatus;
use tracing::{debug, info, warn};

use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::operations;
use crate::screens::ScreenRequest;
use crate::state::AppState;

/// Which command list a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandHook {
    /// After a worktree is created.
    Init,
    /// Before a worktree is removed.
    Terminate,
}

impl CommandHook {
    pub fn label(self) -> &'static str {
        match self {
            CommandHook::Init => "init",
            CommandHook::Terminate => "terminate",
        }
    }
}

/// One worktree of a prune batch, with its own command environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneTarget {
    pub path: PathBuf,
    pub branch: String,
    pub env: CommandEnv,
}

/// What happens after a gated batch, whether or not it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    ReloadWorktrees,
    DeleteWorktree { path: PathBuf, branch: String },
    /// Approved commands run per target, inside each target's worktree.
    PruneWorktrees { targets: Vec<PruneTarget> },
}

/// A command batch waiting on the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub hook: CommandHook,
    /// Filled in by the trust check task.
    pub commands: Vec<String>,
    pub cwd: PathBuf,
    pub env: CommandEnv,
    pub continuation: Continuation,
    /// The `.wt` file the decision applies to; `None` if the repository
    /// declares nothing.
    pub trust_path: Option<PathBuf>,
}

impl PendingOperation {
    pub fn new(hook: CommandHook, cwd: PathBuf, env: CommandEnv, continuation: Continuation) -> Self {
        Self {
            hook,
            commands: Vec::new(),
            cwd,
            env,
            continuation,
            trust_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustResolution {
    TrustAndRun,
    Block,
    Cancel,
}

/// Starts gating `op`: the commands and trust status are resolved off the
/// dispatcher.
pub fn request(app: &mut AppState, op: PendingOperation) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::TrustCheck, &mut effects);
    effects.push(UiEffect::CheckTrust { task, op });
    effects
}

/// Applies the trust mode once commands and status are known.
pub fn on_checked(
    app: &mut AppState,
    op: PendingOperation,
    status: Result<TrustStatus, String>,
) -> Vec<UiEffect> {
    if op.commands.is_empty() {
        return operations::run_continuation(app, op.continuation, Vec::new());
    }
    match app.tui.config.trust_mode {
        TrustMode::Never => {
            debug!(hook = op.hook.label(), "trust mode is never; skipping commands");
            operations::run_continuation(app, op.continuation, Vec::new())
        }
        TrustMode::Always => execute(app, op),
        TrustMode::Ask => {
            let status = status.unwrap_or_else(|error| {
                warn!(%error, "trust check failed; asking");
                TrustStatus::Unknown
            });
            match status {
                TrustStatus::Trusted => execute(app, op),
                TrustStatus::Blocked => {
                    info!(hook = op.hook.label(), "commands blocked; skipping");
                    app.tui.message = Some(format!(
                        "Skipped blocked {} commands",
                        op.hook.label()
                    ));
                    operations::run_continuation(app, op.continuation, Vec::new())
                }
                TrustStatus::Unknown => {
                    if app.tui.pending_operation.is_some() {
                        warn!("replacing an unresolved trust prompt");
                    }
                    app.open_screen(ScreenRequest::Trust {
                        trust_path: op.trust_path.clone(),
                        hook: op.hook,
                        commands: op.commands.clone(),
                    });
                    app.tui.pending_operation = Some(op);
                    Vec::new()
                }
            }
        }
    }
}

/// Resolves the pending operation. The operation is cleared whatever the
/// outcome.
pub fn resolve(app: &mut AppState, resolution: TrustResolution) -> Vec<UiEffect> {
    let Some(op) = app.tui.pending_operation.take() else {
        return Vec::new();
    };
    match resolution {
        TrustResolution::TrustAndRun => {
            let mut effects = record(&op, false);
            effects.extend(execute(app, op));
            effects
        }
        TrustResolution::Block => {
            let mut effects = record(&op, true);
            effects.extend(operations::run_continuation(
                app,
                op.continuation,
                Vec::new(),
            ));
            effects
        }
        TrustResolution::Cancel => {
            debug!(hook = op.hook.label(), "trust prompt cancelled");
            app.tui.message = Some("Cancelled.".to_string());
            Vec::new()
        }
    }
}

/// A batch finished. Failures are reported but never stop the continuation.
pub fn on_commands_finished(
    app: &mut AppState,
    continuation: Continuation,
    error: Option<String>,
) -> Vec<UiEffect> {
    let effects = operations::run_continuation(app, continuation, Vec::new());
    if let Some(error) = error {
        warn!(%error, "hook command failed");
        app.show_info(format!("Error: {error}"));
    }
    effects
}

fn record(op: &PendingOperation, blocked: bool) -> Vec<UiEffect> {
    op.trust_path
        .clone()
        .map(|path| UiEffect::RecordTrust { path, blocked })
        .into_iter()
        .collect()
}

fn execute(app: &mut AppState, op: PendingOperation) -> Vec<UiEffect> {
    if matches!(op.continuation, Continuation::PruneWorktrees { .. }) {
        return operations::run_continuation(app, op.continuation, op.commands);
    }
    let mut effects = Vec::new();
    let task = app.tui.begin_task(TaskKind::Commands, &mut effects);
    effects.push(UiEffect::RunCommands { task, op });
    effects
}
