//! Full-screen TUI for browsing and managing git worktrees.

pub mod common;
pub mod debounce;
pub mod details_cache;
pub mod effects;
pub mod events;
pub mod operations;
pub mod refresh;
pub mod render;
pub mod runtime;
pub mod screens;
pub mod state;
pub mod terminal;
pub mod trust_gate;
pub mod update;
pub mod views;
pub mod watch;

use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use lwt_core::config::{Config, paths};
use lwt_core::trust::FileTrustStore;
pub use runtime::TuiRuntime;
use runtime::{GitConnector, Services};
use tracing::info;

/// Runs the interactive worktree browser rooted at `start_dir`.
///
/// Returns the worktree the user switched to, if any.
///
/// # Errors
/// Returns an error if stdout is not a terminal or the terminal cannot be
/// set up.
pub async fn run(config: Config, start_dir: PathBuf) -> Result<Option<PathBuf>> {
    // The TUI draws on stdout; use --output-selection when capturing it.
    if !stdout().is_terminal() {
        anyhow::bail!(
            "lwt requires a terminal.\n\
             Use `lwt --output-selection <FILE>` when capturing the selected path."
        );
    }

    info!(start_dir = %start_dir.display(), "starting TUI");
    let services = Services {
        trust: Arc::new(FileTrustStore::default_location()),
        connector: Arc::new(GitConnector),
        config_path: paths::config_path(),
        watch: true,
    };

    let mut runtime = TuiRuntime::new(config, start_dir, services)?;
    runtime.run()
}
