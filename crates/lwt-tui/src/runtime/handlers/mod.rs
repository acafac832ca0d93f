//! Effect handlers for the TUI runtime.
//!
//! These functions perform I/O and async work. They do NOT mutate state
//! directly: each one returns the `UiEvent` that reports its outcome, and
//! the executor spawns it and sends the result to the inbox.
//!
//! ```ignore
//! // Handler: pure async, returns UiEvent
//! pub async fn list_worktrees(repo: Arc<dyn RepositoryService>) -> UiEvent { ... }
//!
//! // Executor: spawns and sends to inbox
//! self.spawn_task(TaskKind::WorktreeList, task, meta, true, move |_| handler(repo));
//! ```
//!
//! Config, trust and session files are read with std I/O; those reads go
//! through [`blocking`] so they do not stall the async workers.
//!
//! Handlers of mutating operations drop the affected worktree's cached
//! details before they return, so the follow-up read is fresh.

pub mod files;
pub mod session;
pub mod worktrees;

pub use files::*;
pub use session::*;
pub use worktrees::*;

/// Runs synchronous file I/O on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    use anyhow::Context;
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking file task failed")?
}

/// Formats an error with its full context chain for display.
pub(crate) fn describe(error: &anyhow::Error) -> String {
    format!("{error:#}")
}
