//! Typed leaf errors.
//!
//! Most functions return `anyhow::Result`; these types exist where callers
//! need to tell failures apart (a timed-out script falls back silently, a
//! failed command is reported with its output).

use std::time::Duration;

/// Failure of a single shell or git command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The command ran and exited non-zero.
    #[error("{command}: {output}")]
    Failed { command: String, output: String },

    /// The command could not be started at all.
    #[error("failed to spawn {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the branch-name script hook.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("branch name script timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("branch name script failed: {0}")]
    Failed(String),
}
