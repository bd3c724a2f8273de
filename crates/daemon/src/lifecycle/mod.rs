// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

mod takeover;
pub(crate) use takeover::bind_with_takeover;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::channels::ChannelBroker;
use crate::ci_hub::CiHub;
use crate::env;
use crate::supervisor;
use argo_core::{Clock, SystemClock, WorkflowStatus};
use argo_storage::{CiRegistry, StoreError, WorkflowRegistry, DEFAULT_CI_CAPACITY};

/// Default control port, overridable by ARGO_DAEMON_PORT and --port.
pub const DEFAULT_PORT: u16 = 9876;

/// Daemon configuration: the port and every path under the state root.
#[derive(Debug, Clone)]
pub struct Config {
    /// User home directory (required; anchors executor lookup)
    pub home: PathBuf,
    /// State root (default ~/.argo)
    pub state_dir: PathBuf,
    /// TCP port on loopback
    pub port: u16,
    /// Path to the daemon log file
    pub log_path: PathBuf,
    /// Path to the lock/PID file
    pub lock_path: PathBuf,
    /// Workflow registry snapshot
    pub registry_path: PathBuf,
    /// Executor checkpoint directory
    pub checkpoints_path: PathBuf,
    /// Workflow template directory
    pub templates_path: PathBuf,
    /// CI registry snapshot
    pub ci_registry_path: PathBuf,
    /// Per-workflow executor logs
    pub logs_path: PathBuf,
    /// Maximum tracked workflows
    pub workflow_capacity: usize,
    /// Pinned executor binary (ARGO_WORKFLOW_EXECUTOR)
    pub executor_override: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `--port` beats ARGO_DAEMON_PORT beats the default.
    pub fn load(port_override: Option<u16>) -> Result<Self, LifecycleError> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| LifecycleError::NoStateDir)?;
        let state_dir = env::state_dir()?;
        let port = port_override
            .or_else(env::daemon_port)
            .unwrap_or(DEFAULT_PORT);
        let capacity =
            env::max_workflows().unwrap_or(argo_storage::DEFAULT_WORKFLOW_CAPACITY);
        let executor_override = env::executor_override();

        Ok(Self::from_parts(
            home,
            state_dir,
            port,
            capacity,
            executor_override,
        ))
    }

    /// Build a config from explicit parts (also the test entry point).
    pub fn from_parts(
        home: PathBuf,
        state_dir: PathBuf,
        port: u16,
        workflow_capacity: usize,
        executor_override: Option<PathBuf>,
    ) -> Self {
        Self {
            home,
            port,
            log_path: state_dir.join("daemon.log"),
            lock_path: state_dir.join("daemon.pid"),
            registry_path: state_dir.join("workflows/registry.json"),
            checkpoints_path: state_dir.join("workflows/checkpoints"),
            templates_path: state_dir.join("workflows/templates"),
            ci_registry_path: state_dir.join("ci_registry.json"),
            logs_path: state_dir.join("logs"),
            workflow_capacity,
            executor_override,
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory (HOME unset?)")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind port {0}: {1}")]
    BindFailed(u16, std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Workflow registry (shared with the listener and shared services)
    pub workflows: Arc<Mutex<WorkflowRegistry>>,
    /// CI registry + lifecycle manager under one lock
    pub cis: Arc<Mutex<CiHub>>,
    /// Per-workflow I/O channels
    pub channels: Arc<ChannelBroker>,
    /// When the daemon started
    pub start_time: Instant,
}

/// Result of daemon startup: state plus the bound TCP listener.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: TcpListener,
}

impl DaemonState {
    /// Shutdown the daemon gracefully: save both registries regardless of
    /// dirty state and drop the lock file.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        if let Err(e) = self.workflows.lock().save(&self.config.registry_path) {
            warn!("Failed to save workflow registry on shutdown: {}", e);
        }
        if let Err(e) = self
            .cis
            .lock()
            .registry
            .save_state(&self.config.ci_registry_path)
        {
            warn!("Failed to save CI registry on shutdown: {}", e);
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directories
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.logs_path)?;
    std::fs::create_dir_all(&config.checkpoints_path)?;
    std::fs::create_dir_all(&config.templates_path)?;

    // 2. Bind the control port, taking it over from a stale daemon if needed
    let listener = bind_with_takeover(config.port).await?;

    // 3. Acquire the lock file and record our PID. The port is the real
    //    mutex; the lock file guards against misconfigured multi-port runs.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    // 4. Load persisted registries
    let mut workflows =
        WorkflowRegistry::load(&config.registry_path, config.workflow_capacity)?;
    let ci_registry = CiRegistry::load_state(&config.ci_registry_path, DEFAULT_CI_CAPACITY)?;

    // 5. Reconcile recovered workflows against live processes
    let channels = Arc::new(ChannelBroker::new());
    reconcile_recovered(&mut workflows, &channels);

    info!(
        workflows = workflows.len(),
        cis = ci_registry.len(),
        port = config.port,
        "Daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            workflows: Arc::new(Mutex::new(workflows)),
            cis: Arc::new(Mutex::new(CiHub::new(ci_registry))),
            channels,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Reconcile registry entries recovered from disk.
///
/// Executors from a previous daemon may still be alive (they reparent on
/// daemon death); those keep their entries and get fresh I/O channels.
/// Entries whose PID is gone are completed and cleared.
fn reconcile_recovered(workflows: &mut WorkflowRegistry, channels: &ChannelBroker) {
    let clock = SystemClock;
    let recovered: Vec<(String, i32)> = workflows
        .list()
        .filter(|w| w.executor_pid > 0)
        .map(|w| (w.workflow_id.clone(), w.executor_pid))
        .collect();

    for (workflow_id, pid) in recovered {
        if supervisor::is_alive(pid) {
            info!(workflow_id = %workflow_id, pid, "recovered live workflow executor");
            channels.create(&workflow_id);
        } else {
            let now_ms = clock.epoch_ms();
            workflows.update(&workflow_id, |w| {
                w.mark_ended(WorkflowStatus::Completed, None, now_ms)
            });
            warn!(
                workflow_id = %workflow_id,
                pid,
                "recovered workflow whose executor is gone, marked completed"
            );
        }
    }
}

#[cfg(test)]
#[path = "../lifecycle_tests.rs"]
mod tests;
