// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argo Daemon (argod)
//!
//! Long-running orchestration service that supervises workflow executor
//! processes and brokers control requests over a loopback HTTP API.
//!
//! Architecture:
//! - Listener: axum server dispatching requests into the subsystems
//! - Shared services: background worker running periodic maintenance
//! - Reaper: SIGCHLD watcher + exit-queue drain on the services tick

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod channels;
mod ci_hub;
mod env;
mod lifecycle;
mod listener;
mod protocol;
mod reaper;
mod services;
mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::lifecycle::{Config, DaemonState, LifecycleError, StartupResult};
use crate::services::{ServicesError, SharedServices, DEFAULT_CHECK_INTERVAL};
use argo_core::{Clock, SystemClock};

/// Interval between dirty-registry flushes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between CI heartbeat sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Interval between exit-queue drains.
const REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Interval between old-workflow prunes.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Terminal workflows that ended longer ago than this are pruned.
const PRUNE_AGE: Duration = Duration::from_secs(24 * 3600);

/// Parsed command line.
#[derive(Debug, PartialEq)]
enum CliAction {
    Run { port: Option<u16> },
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<CliAction, String> {
    let mut port = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(CliAction::Help),
            "--version" | "-V" | "-v" => return Ok(CliAction::Version),
            "--port" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--port requires a value".to_string())?;
                let parsed: u16 = value
                    .parse()
                    .map_err(|_| format!("invalid port: {value}"))?;
                if parsed == 0 {
                    return Err(format!("invalid port: {value}"));
                }
                port = Some(parsed);
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(CliAction::Run { port })
}

fn print_help() {
    println!(
        "argod {}",
        concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"))
    );
    println!("Argo Daemon - supervises workflow executors over a loopback HTTP API");
    println!();
    println!("USAGE:");
    println!("    argod [--port N]");
    println!();
    println!("The daemon is typically started by the `arc` CLI and should not");
    println!("need to be invoked directly. It serves HTTP on 127.0.0.1 only.");
    println!();
    println!("OPTIONS:");
    println!("        --port N     Listen on port N (default 9876, env ARGO_DAEMON_PORT)");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let port = match parse_args(&args) {
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!(
                "argod {}",
                concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"))
            );
            return Ok(());
        }
        Ok(CliAction::Run { port }) => port,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("Usage: argod [--port N | --help | --version]");
            std::process::exit(1);
        }
    };

    // Load configuration before any filesystem work
    let config = match Config::load(port) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    // Rotate the daemon log if it has grown too large
    rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup, so clients can find it)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting argo daemon");
    if let Some(arc_env) = env::arc_env() {
        info!(arc_env = %arc_env, "client environment");
    }

    // Start daemon
    let StartupResult {
        mut daemon,
        listener,
    } = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    // Shutdown flag shared with POST /api/shutdown
    let shutdown_notify = Arc::new(Notify::new());

    let ctx = Arc::new(listener::ListenCtx {
        config: daemon.config.clone(),
        workflows: Arc::clone(&daemon.workflows),
        cis: Arc::clone(&daemon.cis),
        channels: Arc::clone(&daemon.channels),
        clock: SystemClock,
        start_time: daemon.start_time,
        shutdown: Arc::clone(&shutdown_notify),
    });

    // SIGCHLD watcher feeding the exit queue
    let (exit_tx, exit_rx) = reaper::exit_queue();
    reaper::spawn_exit_watcher(exit_tx);

    // Shared services: registry flush, heartbeat sweep, exit drain, prune
    let mut shared = SharedServices::new(DEFAULT_CHECK_INTERVAL);
    register_services(&shared, &daemon, exit_rx);
    shared.start();

    info!(port = daemon.config.port, "Daemon ready, listening on 127.0.0.1");

    // Signal ready for parent process (CLI waiting for startup)
    println!("READY");

    let served = listener::serve(
        listener,
        Arc::clone(&ctx),
        wait_for_shutdown(Arc::clone(&shutdown_notify)),
    )
    .await;
    if let Err(e) = served {
        error!("HTTP server error: {}", e);
    }

    // Outstanding service tasks complete before the final saves
    shared.stop().await;
    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Resolve when a shutdown is requested via the API, SIGTERM, or SIGINT.
async fn wait_for_shutdown(shutdown: Arc<Notify>) {
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = shutdown.notified() => info!("Shutdown flag set"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            }
        }
        _ => {
            warn!("failed to install signal handlers, API shutdown only");
            shutdown.notified().await;
        }
    }
}

/// Register the daemon's periodic maintenance tasks.
fn register_services(
    shared: &SharedServices,
    daemon: &DaemonState,
    mut exit_rx: reaper::ExitReceiver,
) {
    {
        let workflows = Arc::clone(&daemon.workflows);
        let cis = Arc::clone(&daemon.cis);
        let registry_path = daemon.config.registry_path.clone();
        let ci_path = daemon.config.ci_registry_path.clone();
        log_register(shared.register("registry-flush", FLUSH_INTERVAL, move || {
            {
                let mut registry = workflows.lock();
                if registry.is_dirty() {
                    if let Err(e) = registry.save(&registry_path) {
                        warn!("workflow registry save failed: {}", e);
                    }
                }
            }
            let mut hub = cis.lock();
            if hub.registry.is_dirty() {
                if let Err(e) = hub.registry.save_state(&ci_path) {
                    warn!("CI registry save failed: {}", e);
                }
            }
        }));
    }

    {
        let cis = Arc::clone(&daemon.cis);
        log_register(shared.register("heartbeat-sweep", SWEEP_INTERVAL, move || {
            let errored = cis.lock().sweep(SystemClock.epoch_ms());
            if !errored.is_empty() {
                warn!(cis = ?errored, "CIs exceeded missed heartbeats");
            }
        }));
    }

    {
        let workflows = Arc::clone(&daemon.workflows);
        let channels = Arc::clone(&daemon.channels);
        log_register(shared.register("exit-drain", REAP_INTERVAL, move || {
            reaper::drain_exits(&mut exit_rx, &workflows, &channels, &SystemClock);
        }));
    }

    {
        let workflows = Arc::clone(&daemon.workflows);
        log_register(shared.register("workflow-prune", PRUNE_INTERVAL, move || {
            let cutoff = SystemClock
                .epoch_ms()
                .saturating_sub(PRUNE_AGE.as_millis() as u64);
            let removed = workflows.lock().prune(cutoff);
            if !removed.is_empty() {
                info!(count = removed.len(), "pruned old workflows");
            }
        }));
    }
}

fn log_register(result: Result<(), ServicesError>) {
    if let Err(e) = result {
        error!("failed to register service task: {}", e);
    }
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2→.3, .1→.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log → .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to log before anything else.
/// Clients use this to find where the current startup attempt begins.
/// Full format: "--- argod: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- argod: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Append marker to log file with PID, followed by a blank line so the
    // marker and any subsequent ERROR line appear on non-consecutive lines
    // for legibility when scanning the log.
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(
        file,
        "{}{}) ---\n",
        STARTUP_MARKER_PREFIX,
        std::process::id()
    )?;

    Ok(())
}

/// Write startup error synchronously to log file.
/// This ensures the error is visible to clients even if the process exits quickly.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Set up file appender (rotation happens at startup via rotate_log_if_needed)
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
