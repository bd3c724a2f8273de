// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error mapping.
//!
//! Every failure surfaces as `{"error": "<message>"}` with the status code
//! the clients rely on: 400 validation, 404 missing, 409 duplicate,
//! 429 capacity, 500 internal. Numeric taxonomy codes appear in logs only.

use crate::channels::ChannelError;
use crate::protocol::ErrorBody;
use crate::supervisor::SupervisorError;
use argo_storage::CiRegistryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid request parameters
    #[error("{0}")]
    Input(String),

    /// Unknown workflow or CI
    #[error("{0}")]
    NotFound(String),

    /// Conflicting identifier
    #[error("{0}")]
    Duplicate(String),

    /// A bounded resource is exhausted
    #[error("{0}")]
    Capacity(String),

    /// Malformed JSON or HTTP
    #[error("{0}")]
    Protocol(String),

    /// OS call failure
    #[error("{0}")]
    System(String),

    /// Corruption or broken invariant
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Duplicate(_) => StatusCode::CONFLICT,
            ApiError::Capacity(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Protocol(_) => StatusCode::BAD_REQUEST,
            ApiError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Numeric taxonomy code, for logs only.
    pub fn code(&self) -> u16 {
        match self {
            ApiError::System(_) => 100,
            ApiError::Input(_) => 200,
            ApiError::NotFound(_) => 201,
            ApiError::Duplicate(_) => 202,
            ApiError::Capacity(_) => 203,
            ApiError::Protocol(_) => 300,
            ApiError::Internal(_) => 500,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match &self {
            ApiError::System(_) | ApiError::Internal(_) => {
                error!(code = self.code(), "{}", message)
            }
            ApiError::Protocol(_) => warn!(code = self.code(), "{}", message),
            _ => debug!(code = self.code(), "{}", message),
        }
        (self.status(), Json(ErrorBody { error: message })).into_response()
    }
}

impl From<SupervisorError> for ApiError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Duplicate(_) => ApiError::Duplicate(e.to_string()),
            SupervisorError::AtCapacity(_) => ApiError::Capacity(e.to_string()),
            SupervisorError::TemplateNotFound(_) | SupervisorError::WorkflowNotFound => {
                ApiError::NotFound(e.to_string())
            }
            SupervisorError::ExecutorNotFound | SupervisorError::Spawn(_) => {
                ApiError::System(e.to_string())
            }
        }
    }
}

impl From<CiRegistryError> for ApiError {
    fn from(e: CiRegistryError) -> Self {
        match e {
            CiRegistryError::Duplicate(_) | CiRegistryError::PortTaken(_) => {
                ApiError::Duplicate(e.to_string())
            }
            CiRegistryError::AtCapacity(_) | CiRegistryError::PortsExhausted(_) => {
                ApiError::Capacity(e.to_string())
            }
            CiRegistryError::Unknown(_) => ApiError::NotFound(e.to_string()),
        }
    }
}

impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::NoChannel => ApiError::NotFound("not found".to_string()),
            ChannelError::Full => ApiError::Capacity(e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
