// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use argo_core::{FakeClock, WorkflowConfig, WorkflowInstance};
use tempfile::tempdir;

fn test_config(dir: &std::path::Path) -> Config {
    Config::from_parts(
        dir.to_path_buf(),
        dir.join(".argo"),
        // Port 0 binds an ephemeral port, keeping tests conflict-free
        0,
        argo_storage::DEFAULT_WORKFLOW_CAPACITY,
        None,
    )
}

fn test_instance(id_suffix: &str, pid: i32) -> WorkflowInstance {
    let clock = FakeClock::new(1_000);
    let mut wf = WorkflowInstance::new(
        WorkflowConfig {
            template: "wf".to_string(),
            instance: id_suffix.to_string(),
            branch: "main".to_string(),
            environment: "dev".to_string(),
        },
        &clock,
    );
    if pid > 0 {
        wf.mark_started(pid, 2_000);
    }
    wf
}

#[test]
fn test_config_paths_anchor_at_state_dir() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let root = dir.path().join(".argo");

    assert_eq!(config.log_path, root.join("daemon.log"));
    assert_eq!(config.lock_path, root.join("daemon.pid"));
    assert_eq!(config.registry_path, root.join("workflows/registry.json"));
    assert_eq!(
        config.checkpoints_path,
        root.join("workflows/checkpoints")
    );
    assert_eq!(config.templates_path, root.join("workflows/templates"));
    assert_eq!(config.ci_registry_path, root.join("ci_registry.json"));
    assert_eq!(config.logs_path, root.join("logs"));
}

#[tokio::test]
async fn test_startup_creates_state_tree_and_lock() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let StartupResult { daemon, listener } = startup(&config).await.unwrap();

    assert!(config.logs_path.is_dir());
    assert!(config.checkpoints_path.is_dir());
    assert!(config.templates_path.is_dir());
    let pid_contents = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(
        pid_contents.trim(),
        std::process::id().to_string()
    );
    assert!(listener.local_addr().unwrap().port() > 0);
    assert!(daemon.workflows.lock().is_empty());
}

#[tokio::test]
async fn test_shutdown_saves_registries_and_removes_lock() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let StartupResult {
        mut daemon,
        listener,
    } = startup(&config).await.unwrap();
    drop(listener);

    daemon.workflows.lock().add(test_instance("t1", 0)).unwrap();
    daemon
        .cis
        .lock()
        .register("test-ci", argo_core::CiRole::Builder, "claude", "localhost", None, 1)
        .unwrap();

    daemon.shutdown().unwrap();

    assert!(!config.lock_path.exists());
    assert!(config.registry_path.exists());
    assert!(config.ci_registry_path.exists());

    // Fresh startup recovers the saved state
    let StartupResult { daemon, listener } = startup(&config).await.unwrap();
    drop(listener);
    assert!(daemon.workflows.lock().get("wf_t1").is_some());
    assert!(daemon.cis.lock().registry.find("test-ci").is_some());
}

#[test]
fn test_reconcile_clears_dead_pids() {
    let mut workflows = argo_storage::WorkflowRegistry::default();
    // PID from a long-dead process; liveness probe fails
    workflows.add(test_instance("dead", i32::MAX - 1)).unwrap();
    let channels = ChannelBroker::new();

    reconcile_recovered(&mut workflows, &channels);

    let wf = workflows.get("wf_dead").unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.executor_pid, 0);
    assert!(!channels.exists("wf_dead"));
}

#[test]
fn test_reconcile_keeps_live_pids() {
    let mut workflows = argo_storage::WorkflowRegistry::default();
    // Our own PID is alive by definition
    let own_pid = std::process::id() as i32;
    workflows.add(test_instance("live", own_pid)).unwrap();
    let channels = ChannelBroker::new();

    reconcile_recovered(&mut workflows, &channels);

    let wf = workflows.get("wf_live").unwrap();
    assert_eq!(wf.status, WorkflowStatus::Running);
    assert_eq!(wf.executor_pid, own_pid);
    assert!(channels.exists("wf_live"));
}
