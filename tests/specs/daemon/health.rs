//! Daemon health and version specs.

use crate::prelude::*;

#[test]
fn health_reports_ok() {
    let daemon = DaemonHarness::start();

    let (status, body) = daemon.get("/api/health");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_secs"].is_u64());
}

#[test]
fn version_reports_build_metadata() {
    let daemon = DaemonHarness::start();

    let (status, body) = daemon.get("/api/version");
    assert_eq!(status, 200);
    assert!(body["version"].as_str().unwrap().contains('.'));
    assert!(!body["build"].as_str().unwrap().is_empty());
}

#[test]
fn shutdown_exits_cleanly() {
    let daemon = DaemonHarness::start();
    // shutdown() asserts a 200 response and exit code 0
    daemon.shutdown();
}
