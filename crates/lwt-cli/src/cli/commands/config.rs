//! Config command handlers.

use anyhow::{Context, Result};
use lwt_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    let created = config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    if created {
        println!("Created config at {}", config_path.display());
    } else {
        println!("Config already exists at {}", config_path.display());
    }
    Ok(())
}
