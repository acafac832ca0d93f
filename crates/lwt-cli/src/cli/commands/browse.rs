//! Interactive worktree browser.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use lwt_core::config::{Config, paths};
use lwt_core::logging;
use tracing::info;

pub async fn run(repo: Option<&Path>, output_selection: Option<&Path>) -> Result<()> {
    let config_path = paths::config_path();
    let config = Config::load_from(&config_path)?;

    // Held until exit so buffered log lines are flushed.
    let _guard = logging::init(&paths::log_path(), &config.log_level)?;

    let start_dir = match repo {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("read current directory")?,
    };

    let selection = lwt_tui::run(config, start_dir).await?;
    let Some(selected) = selection else {
        info!("exited without a selection");
        return Ok(());
    };

    info!(path = %selected.display(), "switching to worktree");
    match output_selection {
        Some(file) => fs::write(file, format!("{}\n", selected.display()))
            .with_context(|| format!("write selection to {}", file.display()))?,
        None => println!("{}", selected.display()),
    }
    Ok(())
}
