// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! I/O channel handlers: the client side pushes input and pops output,
//! the executor side pops input and pushes output.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{ApiError, ListenCtx};
use crate::protocol::{AckResponse, InputRequest, MessageResponse, OutputRequest};

pub(super) async fn push_input(
    State(ctx): State<Arc<ListenCtx>>,
    Path(workflow_id): Path<String>,
    body: Result<Json<InputRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Protocol(e.body_text()))?;
    let message = req
        .input
        .ok_or_else(|| ApiError::Input("missing input".to_string()))?;
    ctx.channels.push_input(&workflow_id, message)?;
    Ok(Json(AckResponse::success()))
}

pub(super) async fn pop_input(
    State(ctx): State<Arc<ListenCtx>>,
    Path(workflow_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(pop_response(ctx.channels.pop_input(&workflow_id)?))
}

pub(super) async fn push_output(
    State(ctx): State<Arc<ListenCtx>>,
    Path(workflow_id): Path<String>,
    body: Result<Json<OutputRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Protocol(e.body_text()))?;
    let message = req
        .output
        .ok_or_else(|| ApiError::Input("missing output".to_string()))?;
    ctx.channels.push_output(&workflow_id, message)?;
    Ok(Json(AckResponse::success()))
}

pub(super) async fn pop_output(
    State(ctx): State<Arc<ListenCtx>>,
    Path(workflow_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(pop_response(ctx.channels.pop_output(&workflow_id)?))
}

/// One message as JSON, or 204 when the queue is empty.
fn pop_response(message: Option<String>) -> Response {
    match message {
        Some(message) => Json(MessageResponse { message }).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
#[path = "channels_tests.rs"]
mod tests;
