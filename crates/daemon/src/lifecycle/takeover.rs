// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful port takeover.
//!
//! Bind conflicts mean a previous daemon (possibly wedged) still owns the
//! port. Ask it to shut down over its own API; if it does not release the
//! port within the wait budget, find the owner via the OS and kill it.

use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::LifecycleError;

/// Polling interval while waiting for the port to free up.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the previous owner gets to exit after the shutdown request.
const GRACEFUL_WAIT: Duration = Duration::from_secs(2);

/// How long a force-killed owner gets to release the port.
const FORCED_WAIT: Duration = Duration::from_secs(1);

/// Bind the loopback control port, taking it over from a stale daemon.
pub(crate) async fn bind_with_takeover(port: u16) -> Result<TcpListener, LifecycleError> {
    let initial_err = match try_bind(port).await {
        Ok(listener) => return Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => e,
        Err(e) => return Err(LifecycleError::BindFailed(port, e)),
    };

    info!(port, "port in use, requesting graceful shutdown of owner");
    request_shutdown(port).await;

    if let Some(listener) = wait_for_bind(port, GRACEFUL_WAIT).await {
        info!(port, "took over port after graceful shutdown");
        return Ok(listener);
    }

    // The owner ignored us; terminate it
    match port_owner_pid(port) {
        Some(pid) => {
            warn!(port, pid, "previous owner did not exit, killing it");
            let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        }
        None => warn!(port, "could not identify port owner"),
    }

    match wait_for_bind(port, FORCED_WAIT).await {
        Some(listener) => {
            info!(port, "took over port after forced termination");
            Ok(listener)
        }
        None => Err(LifecycleError::BindFailed(port, initial_err)),
    }
}

async fn try_bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port)).await
}

/// POST /api/shutdown to the current port owner. Errors are expected when
/// the owner is not an argo daemon; the caller falls through to force.
async fn request_shutdown(port: u16) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("failed to build takeover client: {}", e);
            return;
        }
    };

    match client
        .post(format!("http://127.0.0.1:{port}/api/shutdown"))
        .send()
        .await
    {
        Ok(resp) => info!(port, status = %resp.status(), "shutdown requested"),
        Err(e) => warn!(port, "shutdown request failed: {}", e),
    }
}

async fn wait_for_bind(port: u16, budget: Duration) -> Option<TcpListener> {
    let deadline = tokio::time::Instant::now() + budget;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(POLL_INTERVAL).await;
        if let Ok(listener) = try_bind(port).await {
            return Some(listener);
        }
    }
    None
}

/// Find the PID listening on `port` via `lsof`.
fn port_owner_pid(port: u16) -> Option<i32> {
    let output = std::process::Command::new("lsof")
        .args(["-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
        .output()
        .ok()?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}
