//! CI registry specs: registration, port allocation, persistence across
//! daemon restarts.

use crate::prelude::*;
use serde_json::json;

#[test]
fn register_and_list() {
    let daemon = DaemonHarness::start();

    let (status, body) = daemon.post(
        "/api/ci/register",
        json!({"name": "test-ci", "role": "builder", "model": "claude"}),
    );
    assert_eq!(status, 200);
    assert_eq!(body["port"], 9000);

    let (status, body) = daemon.get("/api/ci/list");
    assert_eq!(status, 200);
    let cis = body["cis"].as_array().unwrap();
    assert_eq!(cis.len(), 1);
    assert_eq!(cis[0]["name"], "test-ci");
    assert_eq!(cis[0]["status"], "offline");
}

#[test]
fn builder_ports_allocate_sequentially() {
    let daemon = DaemonHarness::start();

    for i in 0..5 {
        let (status, body) = daemon.post(
            "/api/ci/register",
            json!({"name": format!("builder-{i}"), "role": "builder", "model": "claude"}),
        );
        assert_eq!(status, 200);
        assert_eq!(body["port"], 9000 + i);
    }

    // A different role allocates from its own block
    let (_, body) = daemon.post(
        "/api/ci/register",
        json!({"name": "coord", "role": "coordinator", "model": "claude"}),
    );
    assert_eq!(body["port"], 9010);
}

#[test]
fn duplicate_name_is_conflict() {
    let daemon = DaemonHarness::start();

    daemon.post(
        "/api/ci/register",
        json!({"name": "test-ci", "role": "builder", "model": "claude"}),
    );
    let (status, body) = daemon.post(
        "/api/ci/register",
        json!({"name": "test-ci", "role": "analysis", "model": "claude"}),
    );
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));
}

#[test]
fn lifecycle_events_and_status() {
    let daemon = DaemonHarness::start();

    daemon.post(
        "/api/ci/register",
        json!({"name": "test-ci", "role": "builder", "model": "claude"}),
    );

    for (event, expected) in [("created", "starting"), ("ready", "ready")] {
        let (status, body) = daemon.post(
            "/api/ci/event",
            json!({"name": "test-ci", "event": event, "reason": "spec"}),
        );
        assert_eq!(status, 200);
        assert_eq!(body["ci_status"], expected);
    }

    let (status, _) = daemon.post_empty("/api/ci/heartbeat?name=test-ci");
    assert_eq!(status, 200);

    let (status, body) = daemon.get("/api/ci/status?name=test-ci");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["lifecycle"]["history"].as_array().unwrap().len(), 2);

    let (status, _) = daemon.get("/api/ci/status?name=ghost");
    assert_eq!(status, 404);
}

#[test]
fn registry_survives_daemon_restart() {
    let daemon = DaemonHarness::start();
    let port = daemon.port;

    let (status, _) = daemon.post(
        "/api/ci/register",
        json!({
            "name": "test-ci",
            "role": "builder",
            "model": "claude",
            "host": "localhost",
            "port": 9000,
        }),
    );
    assert_eq!(status, 200);

    // Clean shutdown persists the registry; restart on the same HOME
    let home = daemon.shutdown();
    let daemon = DaemonHarness::restart(home, port);

    let (status, body) = daemon.get("/api/ci/status?name=test-ci");
    assert_eq!(status, 200);
    assert_eq!(body["name"], "test-ci");
    assert_eq!(body["role"], "builder");
    assert_eq!(body["model"], "claude");
    assert_eq!(body["port"], 9000);
    assert_eq!(body["status"], "offline");
}
