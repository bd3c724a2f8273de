// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tolerant reader for executor checkpoint files.
//!
//! The executor owns these files and rewrites them between steps; the
//! daemon only ever reads them to enrich status responses. Absence or
//! corruption is non-fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Progress snapshot written by the executor between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub is_paused: bool,
}

/// Path of a workflow's checkpoint file under the checkpoints directory.
pub fn checkpoint_path(dir: &Path, workflow_id: &str) -> PathBuf {
    dir.join(format!("{workflow_id}.json"))
}

/// Read a workflow's checkpoint, returning `None` when the file is
/// missing, truncated, or unparseable.
pub fn read_checkpoint(dir: &Path, workflow_id: &str) -> Option<Checkpoint> {
    let path = checkpoint_path(dir, workflow_id);
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
