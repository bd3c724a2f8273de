// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::{ApiError, ListenCtx};
use crate::protocol::{
    ListWorkflowsResponse, SignalResponse, StartWorkflowRequest, StartWorkflowResponse,
    WorkflowStatusResponse, WorkflowSummary,
};
use crate::supervisor;
use argo_core::{WorkflowConfig, WorkflowStatus};

/// Query parameters identifying a workflow.
#[derive(Debug, Deserialize)]
pub(super) struct WorkflowQuery {
    workflow_name: Option<String>,
}

impl WorkflowQuery {
    fn require(self) -> Result<String, ApiError> {
        self.workflow_name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Input("missing workflow_name".to_string()))
    }
}

/// Validate a template/instance name: non-empty, `[A-Za-z0-9._-]` only.
fn validate_name(kind: &str, value: Option<String>) -> Result<String, ApiError> {
    let value = value
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Input(format!("missing {kind}")))?;
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(ApiError::Input(format!("invalid {kind}: {value}")));
    }
    Ok(value)
}

pub(super) async fn start(
    State(ctx): State<Arc<ListenCtx>>,
    body: Result<Json<StartWorkflowRequest>, JsonRejection>,
) -> Result<Json<StartWorkflowResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Protocol(e.body_text()))?;

    let params = WorkflowConfig {
        template: validate_name("template", req.template)?,
        instance: validate_name("instance", req.instance)?,
        branch: req.branch.filter(|s| !s.is_empty()).unwrap_or_else(|| "main".to_string()),
        environment: req
            .environment
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "default".to_string()),
    };

    info!(
        template = %params.template,
        instance = %params.instance,
        branch = %params.branch,
        "workflow start requested"
    );

    let workflow_id = supervisor::start_workflow(
        &ctx.config,
        &ctx.workflows,
        &ctx.channels,
        &ctx.clock,
        params,
    )?;

    Ok(Json(StartWorkflowResponse {
        status: "success".to_string(),
        workflow_id,
    }))
}

pub(super) async fn list(State(ctx): State<Arc<ListenCtx>>) -> Json<ListWorkflowsResponse> {
    let workflows = ctx
        .workflows
        .lock()
        .list()
        .map(WorkflowSummary::from)
        .collect();
    Json(ListWorkflowsResponse { workflows })
}

pub(super) async fn status(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<WorkflowStatusResponse>, ApiError> {
    let workflow_id = query.require()?;
    let (instance, checkpoint) =
        supervisor::inspect_workflow(&ctx.config, &ctx.workflows, &ctx.clock, &workflow_id)?;
    Ok(Json(WorkflowStatusResponse::from_parts(
        &instance,
        checkpoint.as_ref(),
    )))
}

pub(super) async fn pause(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<SignalResponse>, ApiError> {
    let workflow_id = query.require()?;
    let workflow_status =
        supervisor::pause_workflow(&ctx.workflows, &workflow_id, &ctx.clock)?;
    Ok(Json(SignalResponse {
        status: "success".to_string(),
        workflow_id,
        workflow_status,
    }))
}

pub(super) async fn resume(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<SignalResponse>, ApiError> {
    let workflow_id = query.require()?;
    let workflow_status =
        supervisor::resume_workflow(&ctx.workflows, &workflow_id, &ctx.clock)?;
    Ok(Json(SignalResponse {
        status: "success".to_string(),
        workflow_id,
        workflow_status,
    }))
}

pub(super) async fn abandon(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<SignalResponse>, ApiError> {
    let workflow_id = query.require()?;
    supervisor::abandon_workflow(&ctx.workflows, &ctx.channels, &workflow_id, &ctx.clock)
        .await?;
    Ok(Json(SignalResponse {
        status: "success".to_string(),
        workflow_id,
        workflow_status: WorkflowStatus::Abandoned,
    }))
}

#[cfg(test)]
#[path = "workflows_tests.rs"]
mod tests;
