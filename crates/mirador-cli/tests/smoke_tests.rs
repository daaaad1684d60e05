//! CLI smoke tests
//!
//! These exercise the binary end to end without launching a browser.

#![allow(deprecated)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn mirador() -> Command {
    let mut cmd = Command::cargo_bin("mirador").expect("Failed to find mirador binary");
    cmd.env_remove("MIRADOR_BASE_URL").env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// Top level
// =============================================================================

#[test]
fn test_version() {
    mirador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_lists_subcommands() {
    mirador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_no_args_fails() {
    mirador().assert().failure();
}

#[test]
fn test_run_help() {
    mirador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-sandbox"))
        .stdout(predicate::str::contains("--jobs"));
}

// =============================================================================
// show
// =============================================================================

#[test]
fn test_show_builtin_outline() {
    mirador()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("landing-colors http://kalm.lk/ "))
        .stdout(predicate::str::contains("register-submit http://kalm.lk/register"));
}

#[test]
fn test_show_base_url_override() {
    mirador()
        .args(["show", "--base-url", "https://staging.example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://staging.example.com/register"));
}

#[test]
fn test_show_case_filter() {
    mirador()
        .args(["show", "--case", "register-form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("register-form"))
        .stdout(predicate::str::contains("landing-colors").not());
}

#[test]
fn test_show_unknown_case_fails() {
    mirador()
        .args(["show", "--case", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no case name contains"));
}

#[test]
fn test_show_yaml() {
    mirador()
        .args(["show", "--yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://kalm.lk/"))
        .stdout(predicate::str::contains("check: console-text-match"));
}

#[test]
fn test_show_rejects_malformed_suite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "name: broken\ncases:\n  - name: a\n  - name: a\n").unwrap();
    mirador()
        .arg("show")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate page case"));
}

// =============================================================================
// init
// =============================================================================

#[test]
fn test_init_writes_loadable_suite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("suites/site.yaml");
    mirador()
        .arg("init")
        .arg(&path)
        .args(["--base-url", "https://example.com/"])
        .assert()
        .success();

    let suite = mirador::Suite::load(&path).unwrap();
    assert_eq!(suite.base_url, "https://example.com/");
    assert_eq!(suite.cases.len(), mirador::Suite::builtin("x").cases.len());

    mirador()
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com/register"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mirador.yaml");
    std::fs::write(&path, "keep me").unwrap();

    mirador()
        .arg("init")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

    mirador().arg("init").arg(&path).arg("--force").assert().success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("cases:"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_rejects_zero_jobs() {
    mirador()
        .args(["run", "--jobs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--jobs must be at least 1"));
}

#[test]
fn test_run_missing_suite_file() {
    let dir = TempDir::new().unwrap();
    mirador()
        .arg("run")
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("I/O error"));
}
