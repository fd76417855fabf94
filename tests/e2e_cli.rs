//! CLI end-to-end tests
//!
//! Tests for the metaforged command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the metaforged binary
#[allow(deprecated)]
fn metaforged_cmd() -> Command {
    Command::cargo_bin("metaforged").unwrap()
}

/// Write a config whose cache lives in `dir`, returning its path.
fn write_config(dir: &Path) -> PathBuf {
    let config_path = dir.join("metaforged.toml");
    let cache_path = dir.join("cache.db");
    fs::write(
        &config_path,
        format!("[cache]\npath = '{}'\n", cache_path.display()),
    )
    .unwrap();
    config_path
}

#[test]
fn test_cli_no_args_shows_help() {
    metaforged_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    metaforged_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("metaforged"));
}

#[test]
fn test_cli_cache_set_then_get() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "set", "provider.tmdb|movie|alien", r#"{"title":"Alien"}"#])
        .args(["--checksum", "v1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stored"));

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "get", "provider.tmdb|movie|alien"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title": "Alien""#));

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "get", "provider.tmdb|movie|alien", "--checksum", "v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("miss"));

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 1"));
}

#[test]
fn test_cli_cache_remove_and_purge() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "set", "k", "42"])
        .assert()
        .success();

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "remove", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed k"));

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "get", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("miss"));

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("purged 0"));
}

#[test]
fn test_cli_cache_set_rejects_invalid_json() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    metaforged_cmd()
        .arg("--config")
        .arg(&config)
        .args(["cache", "set", "k", "{oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_cli_match_folder() {
    let dir = tempdir().unwrap();
    let library = dir.path().join("movies");
    fs::create_dir_all(library.join("The Matrix")).unwrap();
    fs::create_dir_all(library.join("Heat")).unwrap();

    metaforged_cmd()
        .args(["match", &library.to_string_lossy(), "Teh Matrix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The Matrix"));

    metaforged_cmd()
        .args(["match", &library.to_string_lossy(), "Solaris"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No match"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    metaforged_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("cache.db"));
}

#[test]
fn test_cli_validate_rejects_unsorted_thresholds() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[fuzzy]\nthresholds = [0.8, 0.9]\n").unwrap();

    metaforged_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure();
}

#[test]
fn test_cli_validate_missing_file() {
    metaforged_cmd()
        .args(["validate", "/nonexistent/metaforged.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
