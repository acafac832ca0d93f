pub mod browse;
pub mod config;
