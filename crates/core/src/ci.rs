// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Companion Intelligence (CI) worker records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Base of the CI port space. Each role owns a contiguous block of
/// [`SLOTS_PER_ROLE`] ports starting at `PORT_BASE + role_offset`.
pub const PORT_BASE: u16 = 9000;

/// Number of port slots per role.
pub const SLOTS_PER_ROLE: u16 = 10;

/// Role a CI worker is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiRole {
    Builder,
    Coordinator,
    Requirements,
    Analysis,
    Reserved,
}

impl CiRole {
    /// All roles, in port-offset order.
    pub const ALL: [CiRole; 5] = [
        CiRole::Builder,
        CiRole::Coordinator,
        CiRole::Requirements,
        CiRole::Analysis,
        CiRole::Reserved,
    ];

    /// Offset of this role's port block from [`PORT_BASE`].
    pub fn port_offset(&self) -> u16 {
        match self {
            CiRole::Builder => 0,
            CiRole::Coordinator => SLOTS_PER_ROLE,
            CiRole::Requirements => 2 * SLOTS_PER_ROLE,
            CiRole::Analysis => 3 * SLOTS_PER_ROLE,
            CiRole::Reserved => 4 * SLOTS_PER_ROLE,
        }
    }

    /// The contiguous port range owned by this role.
    pub fn port_range(&self) -> Range<u16> {
        let base = PORT_BASE + self.port_offset();
        base..base + SLOTS_PER_ROLE
    }
}

impl fmt::Display for CiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiRole::Builder => write!(f, "builder"),
            CiRole::Coordinator => write!(f, "coordinator"),
            CiRole::Requirements => write!(f, "requirements"),
            CiRole::Analysis => write!(f, "analysis"),
            CiRole::Reserved => write!(f, "reserved"),
        }
    }
}

impl FromStr for CiRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builder" => Ok(CiRole::Builder),
            "coordinator" => Ok(CiRole::Coordinator),
            "requirements" => Ok(CiRole::Requirements),
            "analysis" => Ok(CiRole::Analysis),
            "reserved" => Ok(CiRole::Reserved),
            other => Err(format!("unknown CI role: {}", other)),
        }
    }
}

/// Status of a CI worker, driven by the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Offline,
    Starting,
    Ready,
    Busy,
    Error,
    Shutdown,
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiStatus::Offline => write!(f, "offline"),
            CiStatus::Starting => write!(f, "starting"),
            CiStatus::Ready => write!(f, "ready"),
            CiStatus::Busy => write!(f, "busy"),
            CiStatus::Error => write!(f, "error"),
            CiStatus::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A registered CI worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiEntry {
    pub name: String,
    pub role: CiRole,
    pub model: String,
    pub host: String,
    pub port: u16,
    pub status: CiStatus,
    #[serde(default)]
    pub last_heartbeat_ms: u64,
    pub registered_at_ms: u64,
    #[serde(default)]
    pub messages_sent: u64,
    #[serde(default)]
    pub messages_received: u64,
    #[serde(default)]
    pub errors: u64,
}

impl CiEntry {
    pub fn new(name: &str, role: CiRole, model: &str, host: &str, port: u16, now_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            role,
            model: model.to_string(),
            host: host.to_string(),
            port,
            status: CiStatus::Offline,
            last_heartbeat_ms: now_ms,
            registered_at_ms: now_ms,
            messages_sent: 0,
            messages_received: 0,
            errors: 0,
        }
    }
}

#[cfg(test)]
#[path = "ci_tests.rs"]
mod tests;
