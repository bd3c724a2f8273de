// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API request/response types.
//!
//! These are the wire contract consumed by the `arc` and `ci` clients;
//! every body is a JSON object and error responses always carry a single
//! top-level `error` field.

use argo_core::{CiEntry, CiRole, CiStatus, LifecycleRecord, Transition, WorkflowInstance, WorkflowStatus};
use argo_storage::Checkpoint;
use serde::{Deserialize, Serialize};

/// Error body shared by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub build: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: String,
}

impl AckResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// Body of `POST /api/workflow/start`.
///
/// `template` and `instance` are required; `branch` and `environment`
/// default to `main` and `default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub template: Option<String>,
    pub instance: Option<String>,
    pub branch: Option<String>,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub status: String,
    pub workflow_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub template: String,
    pub instance: String,
    pub branch: String,
    pub environment: String,
    pub status: WorkflowStatus,
    pub executor_pid: i32,
    pub current_step: u32,
    pub total_steps: u32,
}

impl From<&WorkflowInstance> for WorkflowSummary {
    fn from(w: &WorkflowInstance) -> Self {
        Self {
            workflow_id: w.workflow_id.clone(),
            template: w.template_name.clone(),
            instance: w.instance_name.clone(),
            branch: w.active_branch.clone(),
            environment: w.environment.clone(),
            status: w.status,
            executor_pid: w.executor_pid,
            current_step: w.current_step,
            total_steps: w.total_steps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListWorkflowsResponse {
    pub workflows: Vec<WorkflowSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusResponse {
    #[serde(flatten)]
    pub summary: WorkflowSummary,
    pub is_paused: bool,
    pub created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl WorkflowStatusResponse {
    pub fn from_parts(instance: &WorkflowInstance, checkpoint: Option<&Checkpoint>) -> Self {
        let is_paused = checkpoint.map(|c| c.is_paused).unwrap_or(false)
            || instance.status == WorkflowStatus::Suspended;
        Self {
            summary: WorkflowSummary::from(instance),
            is_paused,
            created_at_ms: instance.created_at_ms,
            started_at_ms: instance.started_at_ms,
            ended_at_ms: instance.ended_at_ms,
            exit_code: instance.exit_code,
        }
    }
}

/// Response to pause/resume/abandon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResponse {
    pub status: String,
    pub workflow_id: String,
    pub workflow_status: WorkflowStatus,
}

/// Body of `POST /api/workflow/input/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputRequest {
    pub input: Option<String>,
}

/// Body of `POST /api/workflow/output/:id` (executor side).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputRequest {
    pub output: Option<String>,
}

/// One dequeued channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `POST /api/ci/register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiRegisterRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub model: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiRegisterResponse {
    pub status: String,
    pub name: String,
    pub role: CiRole,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiSummary {
    pub name: String,
    pub role: CiRole,
    pub model: String,
    pub host: String,
    pub port: u16,
    pub status: CiStatus,
    pub last_heartbeat_ms: u64,
    pub registered_at_ms: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
}

impl From<&CiEntry> for CiSummary {
    fn from(e: &CiEntry) -> Self {
        Self {
            name: e.name.clone(),
            role: e.role,
            model: e.model.clone(),
            host: e.host.clone(),
            port: e.port,
            status: e.status,
            last_heartbeat_ms: e.last_heartbeat_ms,
            registered_at_ms: e.registered_at_ms,
            messages_sent: e.messages_sent,
            messages_received: e.messages_received,
            errors: e.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCisResponse {
    pub cis: Vec<CiSummary>,
}

/// Lifecycle bookkeeping attached to a CI status response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_started_at_ms: Option<u64>,
    pub error_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub missed_heartbeats: u32,
    pub history: Vec<Transition>,
}

impl From<&LifecycleRecord> for LifecycleView {
    fn from(r: &LifecycleRecord) -> Self {
        Self {
            current_task: r.current_task.clone(),
            task_started_at_ms: r.task_started_at_ms,
            error_count: r.error_count,
            last_error: r.last_error.clone(),
            missed_heartbeats: r.missed_heartbeats,
            history: r.history.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiStatusResponse {
    #[serde(flatten)]
    pub ci: CiSummary,
    pub lifecycle: LifecycleView,
}

/// Body of `POST /api/ci/event`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiEventRequest {
    pub name: Option<String>,
    pub event: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiEventResponse {
    pub status: String,
    pub name: String,
    pub ci_status: CiStatus,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
