//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "lwt")]
#[command(version)]
#[command(about = "Terminal UI for git worktrees")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository to open (default: current directory)
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// Write the selected worktree path to FILE instead of stdout
    #[arg(long, value_name = "FILE")]
    output_selection: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write a commented default config if none exists
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        None => {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(commands::browse::run(
                cli.repo.as_deref(),
                cli.output_selection.as_deref(),
            ))
        }
    }
}
