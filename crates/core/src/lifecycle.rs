// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle state machine layered over CI registry entries.
//!
//! The state machine owns no CI entries; records are linked to entries by
//! name and the caller passes the entry being transitioned. Invalid
//! transitions are accepted no-ops so that retries stay idempotent.

use crate::ci::{CiEntry, CiStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named trigger applied to a CI's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created,
    Initializing,
    Ready,
    TaskAssigned,
    TaskComplete,
    Error,
    ShutdownReq,
    Shutdown,
    Terminated,
}

impl std::str::FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(LifecycleEvent::Created),
            "initializing" => Ok(LifecycleEvent::Initializing),
            "ready" => Ok(LifecycleEvent::Ready),
            "task_assigned" => Ok(LifecycleEvent::TaskAssigned),
            "task_complete" => Ok(LifecycleEvent::TaskComplete),
            "error" => Ok(LifecycleEvent::Error),
            "shutdown_req" => Ok(LifecycleEvent::ShutdownReq),
            "shutdown" => Ok(LifecycleEvent::Shutdown),
            "terminated" => Ok(LifecycleEvent::Terminated),
            other => Err(format!("unknown lifecycle event: {}", other)),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Created => write!(f, "created"),
            LifecycleEvent::Initializing => write!(f, "initializing"),
            LifecycleEvent::Ready => write!(f, "ready"),
            LifecycleEvent::TaskAssigned => write!(f, "task_assigned"),
            LifecycleEvent::TaskComplete => write!(f, "task_complete"),
            LifecycleEvent::Error => write!(f, "error"),
            LifecycleEvent::ShutdownReq => write!(f, "shutdown_req"),
            LifecycleEvent::Shutdown => write!(f, "shutdown"),
            LifecycleEvent::Terminated => write!(f, "terminated"),
        }
    }
}

/// Compute the successor status for `(from, event)`.
///
/// Returns `None` for transitions the machine does not define; callers treat
/// those as no-ops.
pub fn next_status(from: CiStatus, event: LifecycleEvent) -> Option<CiStatus> {
    use CiStatus as S;
    use LifecycleEvent as E;

    match (from, event) {
        (S::Offline, E::Created | E::Initializing) => Some(S::Starting),
        (S::Starting, E::Ready) => Some(S::Ready),
        (S::Ready, E::TaskAssigned) => Some(S::Busy),
        (S::Busy, E::TaskComplete) => Some(S::Ready),
        // Any live state can fault
        (S::Starting | S::Ready | S::Busy, E::Error) => Some(S::Error),
        // Shutdown can be requested from anywhere; `shutdown` is the
        // worker-initiated variant of the same transition
        (s, E::ShutdownReq | E::Shutdown) if s != S::Shutdown => Some(S::Shutdown),
        (S::Shutdown, E::Terminated) => Some(S::Offline),
        _ => None,
    }
}

/// One accepted transition, recorded in a CI's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub at_ms: u64,
    pub from: CiStatus,
    pub to: CiStatus,
    pub event: LifecycleEvent,
    pub reason: String,
}

/// Per-CI lifecycle bookkeeping, owned 1:1 by a registry entry (by name).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_started_at_ms: Option<u64>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub missed_heartbeats: u32,
    /// Append-only; removing the CI is the only way history disappears
    /// (short of an explicit `clear_history`).
    #[serde(default)]
    pub history: Vec<Transition>,
}

/// State machine manager over CI registry entries.
#[derive(Debug)]
pub struct LifecycleManager {
    records: HashMap<String, LifecycleRecord>,
    pub heartbeat_timeout_ms: u64,
    pub max_missed: u32,
}

/// Default heartbeat timeout before a miss is counted (30 s).
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 30_000;

/// Default number of missed heartbeats before an error event fires.
pub const DEFAULT_MAX_MISSED: u32 = 3;

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT_MS, DEFAULT_MAX_MISSED)
    }
}

impl LifecycleManager {
    pub fn new(heartbeat_timeout_ms: u64, max_missed: u32) -> Self {
        Self {
            records: HashMap::new(),
            heartbeat_timeout_ms,
            max_missed,
        }
    }

    /// Start tracking a CI. Idempotent; an existing record is preserved.
    pub fn track(&mut self, name: &str) {
        self.records.entry(name.to_string()).or_default();
    }

    /// Stop tracking a CI, dropping its record and history.
    pub fn untrack(&mut self, name: &str) -> Option<LifecycleRecord> {
        self.records.remove(name)
    }

    pub fn record(&self, name: &str) -> Option<&LifecycleRecord> {
        self.records.get(name)
    }

    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    /// Apply `event` to `entry`, returning whether a transition was accepted.
    ///
    /// An undefined transition leaves the entry and history untouched and
    /// returns `false`; callers report success either way.
    pub fn apply(
        &mut self,
        entry: &mut CiEntry,
        event: LifecycleEvent,
        reason: &str,
        now_ms: u64,
    ) -> bool {
        let Some(to) = next_status(entry.status, event) else {
            return false;
        };

        let record = self.records.entry(entry.name.clone()).or_default();
        record.history.push(Transition {
            at_ms: now_ms,
            from: entry.status,
            to,
            event,
            reason: reason.to_string(),
        });

        match event {
            LifecycleEvent::Error => {
                record.error_count += 1;
                record.last_error = Some(reason.to_string());
                record.current_task = None;
                record.task_started_at_ms = None;
                entry.errors += 1;
            }
            LifecycleEvent::Terminated => {
                record.current_task = None;
                record.task_started_at_ms = None;
            }
            _ => {}
        }

        entry.status = to;
        true
    }

    /// Assign a task; only valid while the CI is ready.
    pub fn assign_task(&mut self, entry: &mut CiEntry, task: &str, now_ms: u64) -> bool {
        if entry.status != CiStatus::Ready {
            return false;
        }
        let reason = format!("task assigned: {}", task);
        if !self.apply(entry, LifecycleEvent::TaskAssigned, &reason, now_ms) {
            return false;
        }
        let record = self.records.entry(entry.name.clone()).or_default();
        record.current_task = Some(task.to_string());
        record.task_started_at_ms = Some(now_ms);
        true
    }

    /// Complete the current task; returns to ready regardless of `success`.
    pub fn complete_task(&mut self, entry: &mut CiEntry, success: bool, now_ms: u64) -> bool {
        let reason = if success {
            "task complete: success"
        } else {
            "task complete: failed"
        };
        if !self.apply(entry, LifecycleEvent::TaskComplete, reason, now_ms) {
            return false;
        }
        let record = self.records.entry(entry.name.clone()).or_default();
        record.current_task = None;
        record.task_started_at_ms = None;
        true
    }

    /// Record a heartbeat: refreshes the entry and resets the miss counter.
    pub fn heartbeat(&mut self, entry: &mut CiEntry, now_ms: u64) {
        entry.last_heartbeat_ms = now_ms;
        let record = self.records.entry(entry.name.clone()).or_default();
        record.missed_heartbeats = 0;
    }

    /// Heartbeat sweep over all non-offline entries.
    ///
    /// Stale entries accumulate missed heartbeats; crossing the threshold
    /// emits a single error event per CI (an entry already in error is not
    /// re-errored). Returns the names that transitioned to error.
    pub fn sweep<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a mut CiEntry>,
        now_ms: u64,
    ) -> Vec<String> {
        let mut errored = Vec::new();
        for entry in entries {
            if entry.status == CiStatus::Offline {
                continue;
            }
            if now_ms.saturating_sub(entry.last_heartbeat_ms) <= self.heartbeat_timeout_ms {
                continue;
            }
            let record = self.records.entry(entry.name.clone()).or_default();
            record.missed_heartbeats += 1;
            let missed = record.missed_heartbeats;
            if missed >= self.max_missed && entry.status != CiStatus::Error {
                if self.apply(
                    entry,
                    LifecycleEvent::Error,
                    "max missed heartbeats exceeded",
                    now_ms,
                ) {
                    errored.push(entry.name.clone());
                }
            }
        }
        errored
    }

    /// Drop a CI's accumulated transition history, keeping the record.
    pub fn clear_history(&mut self, name: &str) {
        if let Some(record) = self.records.get_mut(name) {
            record.history.clear();
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
