// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow instance records and their status machine.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a workflow instance, derived as
    /// `<template>_<instance>`.
    #[derive(Default)]
    pub struct WorkflowId;
}

/// Status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but executor not yet spawned
    Pending,
    /// Executor process is running
    Running,
    /// Executor paused at a checkpoint
    Suspended,
    /// Executor exited with status 0
    Completed,
    /// Executor exited non-zero or died on a signal
    Failed,
    /// Operator requested termination
    Abandoned,
}

impl WorkflowStatus {
    /// Terminal statuses are monotone: once entered, never left.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Abandoned
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Suspended => write!(f, "suspended"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Parameters for creating a new workflow instance.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub template: String,
    pub instance: String,
    pub branch: String,
    pub environment: String,
}

impl WorkflowConfig {
    /// Derive the workflow id: `<template>_<instance>`.
    pub fn workflow_id(&self) -> WorkflowId {
        WorkflowId::new(format!("{}_{}", self.template, self.instance))
    }
}

/// A supervised workflow instance.
///
/// Created by the supervisor on start, mutated only by the supervisor or the
/// exit-queue drainer, removed from the registry when reaped or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub workflow_id: String,
    pub template_name: String,
    pub instance_name: String,
    pub active_branch: String,
    #[serde(default)]
    pub environment: String,
    pub status: WorkflowStatus,
    /// PID of the executor process; 0 when not running.
    #[serde(default)]
    pub executor_pid: i32,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl WorkflowInstance {
    /// Create a new pending instance.
    pub fn new(config: WorkflowConfig, clock: &impl Clock) -> Self {
        let workflow_id = config.workflow_id();
        Self {
            workflow_id: workflow_id.0,
            template_name: config.template,
            instance_name: config.instance,
            active_branch: config.branch,
            environment: config.environment,
            status: WorkflowStatus::Pending,
            executor_pid: 0,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            ended_at_ms: None,
            current_step: 0,
            total_steps: 0,
            exit_code: None,
        }
    }

    /// Record the spawned executor and move to running.
    pub fn mark_started(&mut self, pid: i32, now_ms: u64) {
        self.executor_pid = pid;
        self.status = WorkflowStatus::Running;
        self.started_at_ms = Some(now_ms);
    }

    /// Move to a terminal status, clearing the PID.
    ///
    /// An already-terminal status is preserved (terminal statuses are
    /// monotone); the exit code and end time are still recorded.
    pub fn mark_ended(&mut self, status: WorkflowStatus, exit_code: Option<i32>, now_ms: u64) {
        if !self.status.is_terminal() {
            self.status = status;
        }
        self.executor_pid = 0;
        self.exit_code = exit_code;
        self.ended_at_ms = Some(now_ms);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
