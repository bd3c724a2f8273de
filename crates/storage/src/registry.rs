// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow registry: in-memory instance table with crash-safe persistence.
//!
//! Mutations never write synchronously; they set a dirty flag and rely on
//! the shared-services flush task (and the shutdown path) to save.

use crate::persist::{self, StoreError};
use argo_core::{WorkflowInstance, WorkflowStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Canonical on-disk format version.
pub const REGISTRY_VERSION: u32 = 1;

/// Default maximum number of tracked workflows.
pub const DEFAULT_WORKFLOW_CAPACITY: usize = 100;

/// Errors from registry mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate workflow: {0}")]
    Duplicate(String),

    #[error("workflow registry at capacity ({0})")]
    AtCapacity(usize),
}

/// On-disk snapshot of the registry.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    saved_at: DateTime<Utc>,
    workflows: Vec<WorkflowInstance>,
}

/// In-memory workflow table with insertion-order enumeration.
#[derive(Debug)]
pub struct WorkflowRegistry {
    workflows: IndexMap<String, WorkflowInstance>,
    capacity: usize,
    dirty: bool,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WORKFLOW_CAPACITY)
    }
}

impl WorkflowRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            workflows: IndexMap::new(),
            capacity,
            dirty: false,
        }
    }

    /// Add a new instance. Fails on a duplicate id or when at capacity.
    pub fn add(&mut self, instance: WorkflowInstance) -> Result<(), RegistryError> {
        if self.workflows.contains_key(&instance.workflow_id) {
            return Err(RegistryError::Duplicate(instance.workflow_id));
        }
        if self.workflows.len() >= self.capacity {
            return Err(RegistryError::AtCapacity(self.capacity));
        }
        self.workflows.insert(instance.workflow_id.clone(), instance);
        self.dirty = true;
        Ok(())
    }

    pub fn get(&self, workflow_id: &str) -> Option<&WorkflowInstance> {
        self.workflows.get(workflow_id)
    }

    /// Enumerate instances in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &WorkflowInstance> {
        self.workflows.values()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Find the workflow owning `pid`.
    pub fn find_by_pid(&self, pid: i32) -> Option<&WorkflowInstance> {
        if pid <= 0 {
            return None;
        }
        self.workflows.values().find(|w| w.executor_pid == pid)
    }

    /// Mutate an instance in place, marking the registry dirty.
    pub fn update<R>(
        &mut self,
        workflow_id: &str,
        f: impl FnOnce(&mut WorkflowInstance) -> R,
    ) -> Option<R> {
        let result = self.workflows.get_mut(workflow_id).map(f);
        if result.is_some() {
            self.dirty = true;
        }
        result
    }

    /// Record executor progress as reported by its checkpoint.
    pub fn update_progress(&mut self, workflow_id: &str, current: u32, total: u32) -> bool {
        self.update(workflow_id, |w| {
            w.current_step = current;
            w.total_steps = total;
        })
        .is_some()
    }

    pub fn remove(&mut self, workflow_id: &str) -> Option<WorkflowInstance> {
        // shift_remove preserves insertion order for enumeration
        let removed = self.workflows.shift_remove(workflow_id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn count_by_status(&self, status: WorkflowStatus) -> usize {
        self.workflows.values().filter(|w| w.status == status).count()
    }

    /// Remove terminal workflows that ended before `cutoff_ms`.
    ///
    /// Running and suspended workflows are never pruned by time.
    pub fn prune(&mut self, cutoff_ms: u64) -> Vec<String> {
        let doomed: Vec<String> = self
            .workflows
            .values()
            .filter(|w| w.is_terminal() && w.ended_at_ms.map(|t| t < cutoff_ms).unwrap_or(false))
            .map(|w| w.workflow_id.clone())
            .collect();

        for id in &doomed {
            self.workflows.shift_remove(id);
        }
        if !doomed.is_empty() {
            self.dirty = true;
        }
        doomed
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save to `path` atomically, clearing the dirty flag on success.
    pub fn save(&mut self, path: &Path) -> Result<(), StoreError> {
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            saved_at: Utc::now(),
            workflows: self.workflows.values().cloned().collect(),
        };
        persist::write_json_atomic(path, &file)?;
        self.dirty = false;
        Ok(())
    }

    /// Load from `path`, tolerating a missing or corrupt file.
    ///
    /// Only version-1 documents are accepted; anything else is quarantined
    /// and the registry starts empty.
    pub fn load(path: &Path, capacity: usize) -> Result<Self, StoreError> {
        let mut registry = Self::new(capacity);

        let Some(file) = persist::read_json_tolerant::<RegistryFile>(path)? else {
            return Ok(registry);
        };

        if file.version != REGISTRY_VERSION {
            let bak = persist::quarantine(path)?;
            warn!(
                version = file.version,
                bak = %bak.display(),
                "Unsupported workflow registry version, starting fresh",
            );
            return Ok(registry);
        }

        for workflow in file.workflows {
            registry
                .workflows
                .insert(workflow.workflow_id.clone(), workflow);
        }
        info!(
            count = registry.workflows.len(),
            path = %path.display(),
            "Loaded workflow registry",
        );
        Ok(registry)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
