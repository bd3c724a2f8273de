//! Workflow lifecycle specs: start, duplicate, status, pause/resume,
//! abandon, and the interactive I/O channels.

use crate::prelude::*;
use serde_json::json;

#[test]
fn start_then_auto_remove_after_exit() {
    let daemon = DaemonHarness::start();

    let workflow_id = daemon.start_workflow("t1");
    assert_eq!(workflow_id, "simple_test_t1");

    // The stub executor exits on its own; the reaper removes the entry
    let removed = wait_for(SPEC_WAIT_MAX_MS, || {
        let (status, body) = daemon.get("/api/workflow/list");
        status == 200 && body["workflows"].as_array().unwrap().is_empty()
    });
    assert!(removed, "workflow was not reaped after executor exit");

    // And a subsequent status is a 404
    let (status, body) = daemon.get("/api/workflow/status?workflow_name=simple_test_t1");
    assert_eq!(status, 404);
    assert_eq!(body, json!({"error": "not found"}));
}

#[test]
fn duplicate_start_is_conflict() {
    let daemon = DaemonHarness::start_with_executor(LONG_EXECUTOR);

    daemon.start_workflow("t1");
    let (status, body) = daemon.post(
        "/api/workflow/start",
        json!({
            "template": "simple_test",
            "instance": "t1",
            "branch": "main",
            "environment": "dev",
        }),
    );
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));
}

#[test]
fn start_validation_failures() {
    let daemon = DaemonHarness::start();

    // Missing instance
    let (status, body) = daemon.post(
        "/api/workflow/start",
        json!({"template": "simple_test"}),
    );
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    // Unknown template
    let (status, _) = daemon.post(
        "/api/workflow/start",
        json!({"template": "ghost", "instance": "t1"}),
    );
    assert_eq!(status, 404);
}

#[test]
fn status_of_missing_workflow_is_not_found() {
    let daemon = DaemonHarness::start();

    let (status, body) = daemon.get("/api/workflow/status?workflow_name=nonexistent");
    assert_eq!(status, 404);
    assert_eq!(body, json!({"error": "not found"}));
}

#[test]
fn pause_and_resume_round_trip() {
    let daemon = DaemonHarness::start_with_executor(LONG_EXECUTOR);
    let id = daemon.start_workflow("t1");

    let (status, body) = daemon.post_empty(&format!("/api/workflow/pause?workflow_name={id}"));
    assert_eq!(status, 200);
    assert_eq!(body["workflow_status"], "suspended");

    let (status, body) = daemon.get(&format!("/api/workflow/status?workflow_name={id}"));
    assert_eq!(status, 200);
    assert_eq!(body["is_paused"], true);

    // Pause twice is pause once
    let (status, _) = daemon.post_empty(&format!("/api/workflow/pause?workflow_name={id}"));
    assert_eq!(status, 200);

    let (status, body) = daemon.post_empty(&format!("/api/workflow/resume?workflow_name={id}"));
    assert_eq!(status, 200);
    assert_eq!(body["workflow_status"], "running");

    let (status, body) = daemon.get(&format!("/api/workflow/status?workflow_name={id}"));
    assert_eq!(status, 200);
    assert_eq!(body["is_paused"], false);
}

#[test]
fn abandon_removes_workflow_after_reap() {
    let daemon = DaemonHarness::start_with_executor(LONG_EXECUTOR);
    let id = daemon.start_workflow("t1");

    let (status, _) = daemon.delete(&format!("/api/workflow/abandon?workflow_name={id}"));
    assert_eq!(status, 200);

    let removed = wait_for(SPEC_WAIT_MAX_MS, || {
        let (status, _) = daemon.get(&format!("/api/workflow/status?workflow_name={id}"));
        status == 404
    });
    assert!(removed, "abandoned workflow was not removed");

    let (_, body) = daemon.get("/api/workflow/list");
    assert!(body["workflows"].as_array().unwrap().is_empty());
}

#[test]
fn interactive_chat_round_trip() {
    let daemon = DaemonHarness::start_with_executor(LONG_EXECUTOR);
    let id = daemon.start_workflow("t1");

    // Client sends a question
    let (status, _) = daemon.post(
        &format!("/api/workflow/input/{id}"),
        json!({"input": "Q1"}),
    );
    assert_eq!(status, 200);

    // Executor side reads it and answers
    let (status, body) = daemon.get(&format!("/api/workflow/input/{id}"));
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Q1");

    let (status, _) = daemon.post(
        &format!("/api/workflow/output/{id}"),
        json!({"output": "A1"}),
    );
    assert_eq!(status, 200);

    // Client reads the answer; the queue is then empty
    let (status, body) = daemon.get(&format!("/api/workflow/output/{id}"));
    assert_eq!(status, 200);
    assert_eq!(body["message"], "A1");

    let (status, _) = daemon.get(&format!("/api/workflow/output/{id}"));
    assert_eq!(status, 204);
}

#[test]
fn channel_of_unknown_workflow_is_not_found() {
    let daemon = DaemonHarness::start();

    let (status, body) = daemon.post(
        "/api/workflow/input/ghost",
        json!({"input": "hello?"}),
    );
    assert_eq!(status, 404);
    assert!(body["error"].is_string());
}
