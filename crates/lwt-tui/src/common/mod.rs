//! Shared leaf types for the TUI.
//!
//! Nothing here may import `UiEvent` or screen state, so every other module
//! can depend on it.

pub mod task;
pub mod text;

pub use task::{TaskCompleted, TaskId, TaskKind, TaskMeta, TaskSeq, TaskStarted, TaskState, Tasks};
pub use text::{sanitize_for_display, truncate_start_with_ellipsis, truncate_with_ellipsis};
