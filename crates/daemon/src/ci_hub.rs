// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI hub: the CI registry and its lifecycle manager under one lock, so
//! registration, heartbeats, and state transitions update both sides
//! atomically. Lifecycle records are linked to entries by name only.

use argo_core::{CiEntry, CiRole, CiStatus, LifecycleEvent, LifecycleManager};
use argo_storage::{CiRegistry, CiRegistryError};

#[derive(Debug)]
pub struct CiHub {
    pub registry: CiRegistry,
    pub lifecycle: LifecycleManager,
}

impl CiHub {
    /// Wrap a loaded registry, tracking every known CI.
    pub fn new(registry: CiRegistry) -> Self {
        let mut lifecycle = LifecycleManager::default();
        for entry in registry.entries() {
            lifecycle.track(&entry.name);
        }
        Self {
            registry,
            lifecycle,
        }
    }

    /// Register a CI and start tracking its lifecycle.
    pub fn register(
        &mut self,
        name: &str,
        role: CiRole,
        model: &str,
        host: &str,
        port: Option<u16>,
        now_ms: u64,
    ) -> Result<CiEntry, CiRegistryError> {
        let entry = self
            .registry
            .add(name, role, model, host, port, now_ms)?
            .clone();
        self.lifecycle.track(name);
        Ok(entry)
    }

    /// Remove a CI together with its lifecycle record and history.
    pub fn unregister(&mut self, name: &str) -> Option<CiEntry> {
        self.lifecycle.untrack(name);
        self.registry.remove(name)
    }

    /// Refresh a CI's heartbeat. Returns false for unknown names.
    pub fn heartbeat(&mut self, name: &str, now_ms: u64) -> bool {
        match self.registry.find_mut(name) {
            Some(entry) => {
                self.lifecycle.heartbeat(entry, now_ms);
                true
            }
            None => false,
        }
    }

    /// Apply a lifecycle event, returning the (possibly unchanged) status.
    ///
    /// Undefined transitions are accepted no-ops; `None` means the CI is
    /// unknown.
    pub fn apply_event(
        &mut self,
        name: &str,
        event: LifecycleEvent,
        reason: &str,
        now_ms: u64,
    ) -> Option<CiStatus> {
        let entry = self.registry.find_mut(name)?;
        self.lifecycle.apply(entry, event, reason, now_ms);
        Some(entry.status)
    }

    /// Heartbeat sweep over the whole registry; returns names that errored.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<String> {
        let errored = self.lifecycle.sweep(self.registry.entries_mut(), now_ms);
        if !errored.is_empty() {
            self.registry.mark_dirty();
        }
        errored
    }
}

#[cfg(test)]
#[path = "ci_hub_tests.rs"]
mod tests;
