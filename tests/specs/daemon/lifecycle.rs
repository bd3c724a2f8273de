//! Daemon lifecycle specs: port takeover and workflow-registry recovery.

use crate::prelude::*;
use serde_json::json;

#[test]
fn second_daemon_takes_over_the_port() {
    let mut first = DaemonHarness::start();
    let port = first.port;

    // A second daemon on the same port asks the first to shut down
    let second_home = tempfile::TempDir::new().unwrap();
    write_stub_executor(second_home.path(), QUICK_EXECUTOR);
    write_template(second_home.path(), "simple_test");
    let second = DaemonHarness::restart(second_home, port);

    assert!(second.is_healthy());
    assert!(
        first.wait_exited(SPEC_WAIT_MAX_MS),
        "first daemon should exit after takeover"
    );

    let (status, _) = second.get("/api/workflow/list");
    assert_eq!(status, 200);
}

#[test]
fn workflow_registry_survives_restart() {
    let daemon = DaemonHarness::start_with_executor(LONG_EXECUTOR);
    let port = daemon.port;
    let id = daemon.start_workflow("t1");

    let home = daemon.shutdown();
    let daemon = DaemonHarness::restart(home, port);

    // The executor outlived the restart, so the entry is recovered live
    let (status, body) = daemon.get(&format!("/api/workflow/status?workflow_name={id}"));
    assert_eq!(status, 200);
    assert_eq!(body["workflow_id"], json!(id));
}
