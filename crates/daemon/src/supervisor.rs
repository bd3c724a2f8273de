// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor supervisor: spawns workflow executors as separate OS
//! processes, signals them for pause/resume, and escalates abandon from
//! SIGTERM to SIGKILL.
//!
//! A rogue workflow must never take the daemon down, so templates always
//! run in a child process; the daemon only ever touches the executor via
//! its PID. Entry removal after exit belongs to the reaper so the exit
//! status is captured consistently.

use crate::channels::ChannelBroker;
use crate::lifecycle::Config;
use argo_core::{Clock, WorkflowConfig, WorkflowInstance, WorkflowStatus};
use argo_storage::{read_checkpoint, Checkpoint, RegistryError, WorkflowRegistry};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the executor binary searched on disk and `$PATH`.
pub const EXECUTOR_BIN: &str = "argo_workflow_executor";

/// Grace period between SIGTERM and SIGKILL on abandon.
pub const ABANDON_GRACE: Duration = Duration::from_secs(1);

/// Errors from supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("duplicate workflow: {0}")]
    Duplicate(String),

    #[error("workflow registry at capacity ({0})")]
    AtCapacity(usize),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("workflow executor not found")]
    ExecutorNotFound,

    #[error("not found")]
    WorkflowNotFound,

    #[error("failed to spawn executor: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<RegistryError> for SupervisorError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Duplicate(id) => SupervisorError::Duplicate(id),
            RegistryError::AtCapacity(n) => SupervisorError::AtCapacity(n),
        }
    }
}

/// True when `pid` refers to a live process (signal 0 probe).
pub fn is_alive(pid: i32) -> bool {
    pid > 0 && kill(Pid::from_raw(pid), None).is_ok()
}

fn send_signal(pid: i32, signal: Signal) -> bool {
    kill(Pid::from_raw(pid), signal).is_ok()
}

/// Resolve the executor binary.
///
/// Precedence: configured override, `./bin/` next to the daemon's working
/// directory, `~/.local/bin/`, then a `$PATH` search.
pub fn resolve_executor(config: &Config) -> Result<PathBuf, SupervisorError> {
    if let Some(path) = &config.executor_override {
        if path.is_file() {
            return Ok(path.clone());
        }
        return Err(SupervisorError::ExecutorNotFound);
    }

    let local = Path::new("./bin").join(EXECUTOR_BIN);
    if local.is_file() {
        return Ok(local);
    }

    let user = config.home.join(".local/bin").join(EXECUTOR_BIN);
    if user.is_file() {
        return Ok(user);
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(EXECUTOR_BIN);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(SupervisorError::ExecutorNotFound)
}

/// Resolve a template name to a JSON file path.
///
/// Names containing a path separator (or ending in `.json`) are treated as
/// literal paths; bare names are looked up under the templates directory.
pub fn resolve_template(config: &Config, template: &str) -> Result<PathBuf, SupervisorError> {
    let candidate = if template.contains('/') || template.ends_with(".json") {
        PathBuf::from(template)
    } else {
        config.templates_path.join(format!("{template}.json"))
    };

    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(SupervisorError::TemplateNotFound(template.to_string()))
    }
}

/// Start a workflow: register it, spawn its executor, record the PID.
///
/// Returns the new workflow id. The daemon does not retry failed spawns;
/// the registry entry is rolled back and the caller decides.
pub fn start_workflow(
    config: &Config,
    workflows: &Mutex<WorkflowRegistry>,
    channels: &ChannelBroker,
    clock: &impl Clock,
    params: WorkflowConfig,
) -> Result<String, SupervisorError> {
    let template_path = resolve_template(config, &params.template)?;
    let executor = resolve_executor(config)?;
    let workflow_id = params.workflow_id().0;

    // Claim the id before spawning so a concurrent duplicate start loses
    {
        let mut registry = workflows.lock();
        registry.add(WorkflowInstance::new(params.clone(), clock))?;
    }

    let spawned = spawn_executor(config, &executor, &workflow_id, &template_path, &params);
    let child = match spawned {
        Ok(child) => child,
        Err(e) => {
            workflows.lock().remove(&workflow_id);
            return Err(e);
        }
    };

    let pid = child.id() as i32;
    // The Child handle is dropped without waiting; the exit is collected
    // by the SIGCHLD reaper.
    drop(child);

    let now_ms = clock.epoch_ms();
    workflows
        .lock()
        .update(&workflow_id, |w| w.mark_started(pid, now_ms));
    channels.create(&workflow_id);

    info!(
        workflow_id = %workflow_id,
        pid,
        template = %template_path.display(),
        branch = %params.branch,
        "started workflow executor"
    );
    Ok(workflow_id)
}

fn spawn_executor(
    config: &Config,
    executor: &Path,
    workflow_id: &str,
    template_path: &Path,
    params: &WorkflowConfig,
) -> Result<std::process::Child, SupervisorError> {
    std::fs::create_dir_all(&config.logs_path)?;

    let log_path = config.logs_path.join(format!("{workflow_id}.log"));
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(&log_path)?;
    let log_err = log.try_clone()?;

    let child = Command::new(executor)
        .arg(workflow_id)
        .arg(template_path)
        .arg(&params.branch)
        .env("ARGO_DAEMON_PORT", config.port.to_string())
        .env("ARGO_WORKFLOW_ID", workflow_id)
        .env("ARGO_ENVIRONMENT", &params.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()?;

    Ok(child)
}

/// Pause a workflow at its next checkpoint (SIGUSR1).
pub fn pause_workflow(
    workflows: &Mutex<WorkflowRegistry>,
    workflow_id: &str,
    clock: &impl Clock,
) -> Result<WorkflowStatus, SupervisorError> {
    signal_workflow(
        workflows,
        workflow_id,
        clock,
        Signal::SIGUSR1,
        WorkflowStatus::Suspended,
    )
}

/// Resume a paused workflow (SIGUSR2).
pub fn resume_workflow(
    workflows: &Mutex<WorkflowRegistry>,
    workflow_id: &str,
    clock: &impl Clock,
) -> Result<WorkflowStatus, SupervisorError> {
    signal_workflow(
        workflows,
        workflow_id,
        clock,
        Signal::SIGUSR2,
        WorkflowStatus::Running,
    )
}

/// Signal a live executor and record the new status.
///
/// A dead PID is reconciled (cleared, workflow completed) and the call
/// still succeeds, keeping pause/resume idempotent at the HTTP level.
fn signal_workflow(
    workflows: &Mutex<WorkflowRegistry>,
    workflow_id: &str,
    clock: &impl Clock,
    signal: Signal,
    on_success: WorkflowStatus,
) -> Result<WorkflowStatus, SupervisorError> {
    let mut registry = workflows.lock();
    let (pid, status) = match registry.get(workflow_id) {
        Some(w) => (w.executor_pid, w.status),
        None => return Err(SupervisorError::WorkflowNotFound),
    };

    if pid <= 0 {
        return Ok(status);
    }

    if is_alive(pid) {
        if !send_signal(pid, signal) {
            warn!(workflow_id, pid, ?signal, "failed to signal executor");
        }
        registry.update(workflow_id, |w| w.status = on_success);
        return Ok(on_success);
    }

    // Executor died without a reap yet; reconcile
    let now_ms = clock.epoch_ms();
    registry.update(workflow_id, |w| {
        w.mark_ended(WorkflowStatus::Completed, None, now_ms)
    });
    debug!(workflow_id, pid, "executor gone, reconciled as completed");
    Ok(WorkflowStatus::Completed)
}

/// Abandon a workflow: SIGTERM, bounded grace, then SIGKILL.
///
/// A live executor's registry entry is left for the reaper; an executor
/// that is already gone is removed immediately.
pub async fn abandon_workflow(
    workflows: &Mutex<WorkflowRegistry>,
    channels: &ChannelBroker,
    workflow_id: &str,
    clock: &impl Clock,
) -> Result<(), SupervisorError> {
    let pid = {
        let mut registry = workflows.lock();
        let Some(wf) = registry.get(workflow_id) else {
            return Err(SupervisorError::WorkflowNotFound);
        };
        let pid = wf.executor_pid;
        registry.update(workflow_id, |w| {
            if !w.status.is_terminal() {
                w.status = WorkflowStatus::Abandoned;
            }
        });
        pid
    };

    if is_alive(pid) {
        let _ = send_signal(pid, Signal::SIGTERM);

        // Grace period; the registry lock is not held across the waits
        let deadline = Instant::now() + ABANDON_GRACE;
        while is_alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if is_alive(pid) {
            warn!(workflow_id, pid, "executor ignored SIGTERM, killing");
            let _ = send_signal(pid, Signal::SIGKILL);
        }
        info!(workflow_id, pid, "abandoned workflow");
        return Ok(());
    }

    // Nothing left to reap; remove the entry now
    let now_ms = clock.epoch_ms();
    let removed = {
        let mut registry = workflows.lock();
        registry.update(workflow_id, |w| {
            w.mark_ended(WorkflowStatus::Abandoned, None, now_ms)
        });
        registry.remove(workflow_id)
    };
    if removed.is_some() {
        channels.destroy(workflow_id);
    }
    info!(workflow_id, "abandoned workflow (executor already gone)");
    Ok(())
}

/// Snapshot a workflow for a status response.
///
/// Merges the executor's checkpoint into the registry entry and reconciles
/// a silently-dead executor before reporting.
pub fn inspect_workflow(
    config: &Config,
    workflows: &Mutex<WorkflowRegistry>,
    clock: &impl Clock,
    workflow_id: &str,
) -> Result<(WorkflowInstance, Option<Checkpoint>), SupervisorError> {
    // Checkpoint read happens before the lock: no disk I/O under the mutex
    let checkpoint = read_checkpoint(&config.checkpoints_path, workflow_id);

    let mut registry = workflows.lock();
    let (pid, _) = match registry.get(workflow_id) {
        Some(w) => (w.executor_pid, w.status),
        None => return Err(SupervisorError::WorkflowNotFound),
    };

    if let Some(cp) = &checkpoint {
        registry.update_progress(workflow_id, cp.current_step, cp.total_steps);
    }

    if pid > 0 && !is_alive(pid) {
        let now_ms = clock.epoch_ms();
        registry.update(workflow_id, |w| {
            w.mark_ended(WorkflowStatus::Completed, None, now_ms)
        });
        debug!(workflow_id, pid, "executor gone, reconciled at status query");
    }

    registry
        .get(workflow_id)
        .cloned()
        .map(|w| (w, checkpoint))
        .ok_or(SupervisorError::WorkflowNotFound)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
