// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argo Daemon library
//!
//! This module exposes the HTTP API types for use by the `arc` and `ci`
//! command-line clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod protocol;

pub use protocol::{
    AckResponse, CiEventRequest, CiEventResponse, CiRegisterRequest, CiRegisterResponse,
    CiStatusResponse, CiSummary, ErrorBody, HealthResponse, InputRequest, LifecycleView,
    ListCisResponse, ListWorkflowsResponse, MessageResponse, OutputRequest, SignalResponse,
    StartWorkflowRequest, StartWorkflowResponse, VersionResponse, WorkflowStatusResponse,
    WorkflowSummary,
};
