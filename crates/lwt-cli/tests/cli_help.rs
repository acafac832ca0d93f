use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_help_shows_options_and_commands() {
    cargo_bin_cmd!("lwt")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--repo"))
        .stdout(predicate::str::contains("--output-selection"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("lwt")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_browse_without_terminal_fails() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("lwt")
        .env("LWT_HOME", dir.path())
        .args(["--repo", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a terminal"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "sort_mode = [").unwrap();

    cargo_bin_cmd!("lwt")
        .env("LWT_HOME", dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
