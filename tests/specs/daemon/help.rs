//! Daemon CLI argument specs.

use crate::prelude::*;
use assert_cmd::Command;

#[test]
fn help_prints_usage_and_exits_zero() {
    let assert = Command::new(argod_binary()).arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("USAGE"));
    assert!(stdout.contains("--port"));
}

#[test]
fn version_prints_and_exits_zero() {
    let assert = Command::new(argod_binary())
        .arg("--version")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.starts_with("argod "));
}

#[test]
fn unexpected_argument_exits_one() {
    let assert = Command::new(argod_binary())
        .arg("--daemonize")
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("unexpected argument"));
}

#[test]
fn invalid_port_exits_one() {
    let assert = Command::new(argod_binary())
        .args(["--port", "0"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("invalid port"));
}
