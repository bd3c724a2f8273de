// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use argo_core::{FakeClock, Clock, WorkflowConfig};

fn test_instance() -> WorkflowInstance {
    let clock = FakeClock::new(1_000);
    let mut wf = WorkflowInstance::new(
        WorkflowConfig {
            template: "simple_test".to_string(),
            instance: "t1".to_string(),
            branch: "main".to_string(),
            environment: "dev".to_string(),
        },
        &clock,
    );
    wf.mark_started(42, clock.epoch_ms());
    wf
}

#[test]
fn test_start_request_tolerates_missing_fields() {
    let req: StartWorkflowRequest = serde_json::from_str(r#"{"template": "t"}"#).unwrap();
    assert_eq!(req.template.as_deref(), Some("t"));
    assert!(req.instance.is_none());
    assert!(req.branch.is_none());
}

#[test]
fn test_error_body_shape() {
    let body = ErrorBody {
        error: "not found".to_string(),
    };
    assert_eq!(
        serde_json::to_string(&body).unwrap(),
        r#"{"error":"not found"}"#
    );
}

#[test]
fn test_workflow_summary_from_instance() {
    let summary = WorkflowSummary::from(&test_instance());
    assert_eq!(summary.workflow_id, "simple_test_t1");
    assert_eq!(summary.template, "simple_test");
    assert_eq!(summary.instance, "t1");
    assert_eq!(summary.executor_pid, 42);
    assert_eq!(summary.status, WorkflowStatus::Running);
}

#[test]
fn test_status_response_flattens_summary() {
    let instance = test_instance();
    let checkpoint = Checkpoint {
        current_step: 1,
        total_steps: 3,
        is_paused: true,
    };
    let response = WorkflowStatusResponse::from_parts(&instance, Some(&checkpoint));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["workflow_id"], "simple_test_t1");
    assert_eq!(json["status"], "running");
    assert_eq!(json["is_paused"], true);
    assert_eq!(json["created_at_ms"], 1_000);
    assert!(json.get("exit_code").is_none());
}

#[test]
fn test_status_response_paused_from_suspension() {
    let mut instance = test_instance();
    instance.status = WorkflowStatus::Suspended;
    let response = WorkflowStatusResponse::from_parts(&instance, None);
    assert!(response.is_paused);
}

#[test]
fn test_ci_summary_round_trip() {
    let entry = CiEntry::new("test-ci", CiRole::Analysis, "claude", "localhost", 9030, 7);
    let summary = CiSummary::from(&entry);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["name"], "test-ci");
    assert_eq!(json["role"], "analysis");
    assert_eq!(json["status"], "offline");
    assert_eq!(json["port"], 9030);

    let back: CiSummary = serde_json::from_value(json).unwrap();
    assert_eq!(back.registered_at_ms, 7);
}

#[test]
fn test_ci_status_response_flattens_entry() {
    let entry = CiEntry::new("test-ci", CiRole::Builder, "claude", "localhost", 9000, 7);
    let response = CiStatusResponse {
        ci: CiSummary::from(&entry),
        lifecycle: LifecycleView::default(),
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["name"], "test-ci");
    assert_eq!(json["lifecycle"]["error_count"], 0);
    assert!(json["lifecycle"]["history"].as_array().unwrap().is_empty());
}
