// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI registry: named AI workers with role-scoped port allocation.

use crate::persist::{self, StoreError};
use argo_core::{CiEntry, CiRole, CiStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Canonical on-disk format version.
pub const CI_REGISTRY_VERSION: u32 = 1;

/// Maximum number of registered CIs.
pub const DEFAULT_CI_CAPACITY: usize = 50;

/// Errors from CI registry mutations.
#[derive(Debug, Error)]
pub enum CiRegistryError {
    #[error("duplicate CI: {0}")]
    Duplicate(String),

    #[error("CI registry at capacity ({0})")]
    AtCapacity(usize),

    #[error("no free ports for role {0}")]
    PortsExhausted(CiRole),

    #[error("port {0} already allocated")]
    PortTaken(u16),

    #[error("unknown CI: {0}")]
    Unknown(String),
}

/// On-disk snapshot of the CI registry.
#[derive(Debug, Serialize, Deserialize)]
struct CiRegistryFile {
    version: u32,
    saved_at: DateTime<Utc>,
    cis: Vec<CiEntry>,
}

/// In-memory CI table, keyed by name, enumerated in insertion order.
#[derive(Debug)]
pub struct CiRegistry {
    entries: IndexMap<String, CiEntry>,
    capacity: usize,
    dirty: bool,
}

impl Default for CiRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CI_CAPACITY)
    }
}

impl CiRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
            dirty: false,
        }
    }

    /// Register a CI. With `port: None` a slot is allocated from the role's
    /// range; an explicit port must not collide with any existing entry.
    pub fn add(
        &mut self,
        name: &str,
        role: CiRole,
        model: &str,
        host: &str,
        port: Option<u16>,
        now_ms: u64,
    ) -> Result<&CiEntry, CiRegistryError> {
        if self.entries.contains_key(name) {
            return Err(CiRegistryError::Duplicate(name.to_string()));
        }
        if self.entries.len() >= self.capacity {
            return Err(CiRegistryError::AtCapacity(self.capacity));
        }

        let port = match port {
            Some(p) => {
                if self.port_in_use(p) {
                    return Err(CiRegistryError::PortTaken(p));
                }
                p
            }
            None => self.allocate_port(role)?,
        };

        let entry = CiEntry::new(name, role, model, host, port, now_ms);
        self.entries.insert(name.to_string(), entry);
        self.dirty = true;
        // Entry was just inserted under this key
        self.entries
            .get(name)
            .ok_or_else(|| CiRegistryError::Unknown(name.to_string()))
    }

    /// Next free slot in the role's contiguous range.
    pub fn allocate_port(&self, role: CiRole) -> Result<u16, CiRegistryError> {
        role.port_range()
            .find(|p| !self.port_in_use(*p))
            .ok_or(CiRegistryError::PortsExhausted(role))
    }

    fn port_in_use(&self, port: u16) -> bool {
        self.entries.values().any(|e| e.port == port)
    }

    pub fn remove(&mut self, name: &str) -> Option<CiEntry> {
        let removed = self.entries.shift_remove(name);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn find(&self, name: &str) -> Option<&CiEntry> {
        self.entries.get(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut CiEntry> {
        let entry = self.entries.get_mut(name);
        if entry.is_some() {
            self.dirty = true;
        }
        entry
    }

    /// First entry registered for `role`.
    pub fn find_by_role(&self, role: CiRole) -> Option<&CiEntry> {
        self.entries.values().find(|e| e.role == role)
    }

    pub fn find_all_by_role(&self, role: CiRole) -> Vec<&CiEntry> {
        self.entries.values().filter(|e| e.role == role).collect()
    }

    /// First READY entry for `role`.
    pub fn find_available(&self, role: CiRole) -> Option<&CiEntry> {
        self.entries
            .values()
            .find(|e| e.role == role && e.status == CiStatus::Ready)
    }

    /// Non-offline entries whose last heartbeat is older than `timeout_ms`.
    ///
    /// Read-only probe; the lifecycle sweep is what escalates staleness to
    /// error events.
    pub fn check_health(&self, timeout_ms: u64, now_ms: u64) -> Vec<&CiEntry> {
        self.entries
            .values()
            .filter(|e| {
                e.status != CiStatus::Offline
                    && now_ms.saturating_sub(e.last_heartbeat_ms) > timeout_ms
            })
            .collect()
    }

    pub fn update_status(&mut self, name: &str, status: CiStatus) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.status = status;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CiEntry> {
        self.entries.values()
    }

    /// Iterate entries mutably. Callers that change persisted fields must
    /// also call [`CiRegistry::mark_dirty`].
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut CiEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save to `path` atomically, clearing the dirty flag on success.
    pub fn save_state(&mut self, path: &Path) -> Result<(), StoreError> {
        let file = CiRegistryFile {
            version: CI_REGISTRY_VERSION,
            saved_at: Utc::now(),
            cis: self.entries.values().cloned().collect(),
        };
        persist::write_json_atomic(path, &file)?;
        self.dirty = false;
        Ok(())
    }

    /// Load from `path`; a missing file yields an empty registry.
    pub fn load_state(path: &Path, capacity: usize) -> Result<Self, StoreError> {
        let mut registry = Self::new(capacity);

        let Some(file) = persist::read_json_tolerant::<CiRegistryFile>(path)? else {
            return Ok(registry);
        };

        if file.version != CI_REGISTRY_VERSION {
            let bak = persist::quarantine(path)?;
            warn!(
                version = file.version,
                bak = %bak.display(),
                "Unsupported CI registry version, starting fresh",
            );
            return Ok(registry);
        }

        for entry in file.cis {
            registry.entries.insert(entry.name.clone(), entry);
        }
        info!(
            count = registry.entries.len(),
            path = %path.display(),
            "Loaded CI registry",
        );
        Ok(registry)
    }
}

#[cfg(test)]
#[path = "ci_registry_tests.rs"]
mod tests;
