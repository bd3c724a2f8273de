// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI request handlers: registration, discovery, heartbeats, and
//! lifecycle events reported by workers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::{ApiError, ListenCtx};
use crate::protocol::{
    AckResponse, CiEventRequest, CiEventResponse, CiRegisterRequest, CiRegisterResponse,
    CiStatusResponse, CiSummary, LifecycleView, ListCisResponse,
};
use argo_core::{CiRole, Clock, LifecycleEvent};

/// Query parameters identifying a CI.
#[derive(Debug, Deserialize)]
pub(super) struct CiQuery {
    name: Option<String>,
}

impl CiQuery {
    fn require(self) -> Result<String, ApiError> {
        self.name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Input("missing name".to_string()))
    }
}

pub(super) async fn register(
    State(ctx): State<Arc<ListenCtx>>,
    body: Result<Json<CiRegisterRequest>, JsonRejection>,
) -> Result<Json<CiRegisterResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Protocol(e.body_text()))?;

    let name = req
        .name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Input("missing name".to_string()))?;
    let role: CiRole = req
        .role
        .ok_or_else(|| ApiError::Input("missing role".to_string()))?
        .parse()
        .map_err(ApiError::Input)?;
    let model = req.model.filter(|s| !s.is_empty()).unwrap_or_else(|| "default".to_string());
    let host = req
        .host
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let now_ms = ctx.clock.epoch_ms();
    let entry = ctx
        .cis
        .lock()
        .register(&name, role, &model, &host, req.port, now_ms)?;

    info!(name = %entry.name, role = %entry.role, port = entry.port, "registered CI");

    Ok(Json(CiRegisterResponse {
        status: "success".to_string(),
        name: entry.name,
        role: entry.role,
        port: entry.port,
    }))
}

pub(super) async fn unregister(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<CiQuery>,
) -> Result<Json<AckResponse>, ApiError> {
    let name = query.require()?;
    match ctx.cis.lock().unregister(&name) {
        Some(entry) => {
            info!(name = %entry.name, "unregistered CI");
            Ok(Json(AckResponse::success()))
        }
        None => Err(ApiError::NotFound("not found".to_string())),
    }
}

pub(super) async fn list(State(ctx): State<Arc<ListenCtx>>) -> Json<ListCisResponse> {
    let cis = ctx
        .cis
        .lock()
        .registry
        .entries()
        .map(CiSummary::from)
        .collect();
    Json(ListCisResponse { cis })
}

pub(super) async fn status(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<CiQuery>,
) -> Result<Json<CiStatusResponse>, ApiError> {
    let name = query.require()?;
    let hub = ctx.cis.lock();
    let entry = hub
        .registry
        .find(&name)
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;
    let lifecycle = hub
        .lifecycle
        .record(&name)
        .map(LifecycleView::from)
        .unwrap_or_default();
    Ok(Json(CiStatusResponse {
        ci: CiSummary::from(entry),
        lifecycle,
    }))
}

pub(super) async fn heartbeat(
    State(ctx): State<Arc<ListenCtx>>,
    Query(query): Query<CiQuery>,
) -> Result<Json<AckResponse>, ApiError> {
    let name = query.require()?;
    let now_ms = ctx.clock.epoch_ms();
    if ctx.cis.lock().heartbeat(&name, now_ms) {
        Ok(Json(AckResponse::success()))
    } else {
        Err(ApiError::NotFound("not found".to_string()))
    }
}

pub(super) async fn event(
    State(ctx): State<Arc<ListenCtx>>,
    body: Result<Json<CiEventRequest>, JsonRejection>,
) -> Result<Json<CiEventResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Protocol(e.body_text()))?;

    let name = req
        .name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Input("missing name".to_string()))?;
    let event: LifecycleEvent = req
        .event
        .ok_or_else(|| ApiError::Input("missing event".to_string()))?
        .parse()
        .map_err(ApiError::Input)?;
    let reason = req.reason.unwrap_or_default();

    let now_ms = ctx.clock.epoch_ms();
    match ctx.cis.lock().apply_event(&name, event, &reason, now_ms) {
        Some(ci_status) => Ok(Json(CiEventResponse {
            status: "success".to_string(),
            name,
            ci_status,
        })),
        None => Err(ApiError::NotFound("not found".to_string())),
    }
}

#[cfg(test)]
#[path = "cis_tests.rs"]
mod tests;
