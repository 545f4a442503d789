use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn branchbook_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("branchbook"));
    for var in [
        "REPOSITORY",
        "OUTPUT",
        "PORT",
        "BRANCHES",
        "DEFAULT",
        "DIR",
        "SLEEP",
        "LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_lists_every_option() {
    let assert = branchbook_cmd().arg("--help").assert().success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for flag in [
        "--port",
        "--branches",
        "--default",
        "--dir",
        "--sleep",
        "--log-level",
        "<REPOSITORY>",
        "[OUTPUT]",
    ] {
        assert!(output.contains(flag), "missing {flag} in:\n{output}");
    }
}

#[test]
fn missing_repository_is_a_usage_error() {
    branchbook_cmd()
        .assert()
        .failure()
        .stderr(contains("<REPOSITORY>"));
}

#[test]
fn invalid_branch_regex_exits_with_status_1() {
    let out = TempDir::new().expect("out");
    branchbook_cmd()
        .args(["https://example.com/ui.git", "-b", "(unclosed"])
        .arg(out.path())
        .assert()
        .code(1)
        .stderr(contains("invalid branch filter"));
}

#[test]
fn repository_can_come_from_the_environment() {
    let out = TempDir::new().expect("out");
    branchbook_cmd()
        .env("REPOSITORY", "https://example.com/ui.git")
        .env("BRANCHES", "[")
        .arg("--port")
        .arg("0")
        .env("OUTPUT", out.path())
        .assert()
        .code(1)
        .stderr(contains("invalid branch filter '['"));
}

#[test]
fn unreachable_repository_exits_with_status_1() {
    let tmp = TempDir::new().expect("tmp");
    let missing = tmp.path().join("no-such-repo.git");
    branchbook_cmd()
        .arg(&missing)
        .arg(tmp.path().join("dist"))
        .args(["--port", "0", "--log-level", "error"])
        .assert()
        .code(1)
        .stderr(contains("branchbook exited with error"));
}
