//! Core worktree library (config, repository service, trust store, persistence).

pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod script;
pub mod trust;
