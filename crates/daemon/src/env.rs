// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve the state root: ARGO_STATE_DIR > $HOME/.argo
///
/// HOME is required; without it the daemon has nowhere to anchor state.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("ARGO_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".argo"))
}

/// Daemon port from ARGO_DAEMON_PORT (overridden by --port).
pub fn daemon_port() -> Option<u16> {
    std::env::var("ARGO_DAEMON_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|p| *p > 0)
}

/// Executor binary override from ARGO_WORKFLOW_EXECUTOR.
pub fn executor_override() -> Option<PathBuf> {
    std::env::var("ARGO_WORKFLOW_EXECUTOR")
        .ok()
        .map(PathBuf::from)
}

/// Workflow registry capacity override from ARGO_MAX_WORKFLOWS.
pub fn max_workflows() -> Option<usize> {
    std::env::var("ARGO_MAX_WORKFLOWS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Informational environment name from ARC_ENV (logged at startup).
pub fn arc_env() -> Option<String> {
    std::env::var("ARC_ENV").ok().filter(|s| !s.is_empty())
}
