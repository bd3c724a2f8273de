// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP listener: routes control requests into the daemon's subsystems.
//!
//! Handlers share a [`ListenCtx`]; none of them hold a registry lock
//! across await points. The server itself is axum on the loopback
//! listener bound during startup.

mod channels;
mod cis;
mod error;
mod workflows;

pub(crate) use error::ApiError;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::info;

use crate::channels::ChannelBroker;
use crate::ci_hub::CiHub;
use crate::lifecycle::Config;
use crate::protocol::{AckResponse, HealthResponse, VersionResponse};
use argo_core::SystemClock;
use argo_storage::WorkflowRegistry;

/// Shared daemon context for all request handlers.
pub(crate) struct ListenCtx {
    pub config: Config,
    pub workflows: Arc<Mutex<WorkflowRegistry>>,
    pub cis: Arc<Mutex<CiHub>>,
    pub channels: Arc<ChannelBroker>,
    pub clock: SystemClock,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Build the API router.
pub(crate) fn router(ctx: Arc<ListenCtx>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/version", get(version))
        .route("/api/shutdown", post(shutdown))
        .route("/api/workflow/start", post(workflows::start))
        .route("/api/workflow/list", get(workflows::list))
        .route("/api/workflow/status", get(workflows::status))
        .route("/api/workflow/abandon", delete(workflows::abandon))
        .route("/api/workflow/pause", post(workflows::pause))
        .route("/api/workflow/resume", post(workflows::resume))
        .route(
            "/api/workflow/input/:id",
            post(channels::push_input).get(channels::pop_input),
        )
        .route(
            "/api/workflow/output/:id",
            get(channels::pop_output).post(channels::push_output),
        )
        .route("/api/ci/register", post(cis::register))
        .route("/api/ci/unregister", delete(cis::unregister))
        .route("/api/ci/list", get(cis::list))
        .route("/api/ci/status", get(cis::status))
        .route("/api/ci/heartbeat", post(cis::heartbeat))
        .route("/api/ci/event", post(cis::event))
        .with_state(ctx)
}

/// Serve requests until the shutdown future resolves.
pub(crate) async fn serve(
    listener: TcpListener,
    ctx: Arc<ListenCtx>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health(State(ctx): State<Arc<ListenCtx>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("BUILD_GIT_HASH").to_string(),
    })
}

/// Set the shutdown flag; the response is written before the daemon exits
/// because graceful shutdown drains in-flight connections.
async fn shutdown(State(ctx): State<Arc<ListenCtx>>) -> Json<AckResponse> {
    info!("Shutdown requested via API");
    // notify_one stores a permit, so the flag survives even if the main
    // loop has not registered its waiter yet
    ctx.shutdown.notify_one();
    Json(AckResponse {
        status: "shutting down".to_string(),
    })
}

#[cfg(test)]
pub(crate) fn test_ctx(dir: &std::path::Path) -> Arc<ListenCtx> {
    test_ctx_with_executor(dir, None)
}

#[cfg(test)]
pub(crate) fn test_ctx_with_executor(
    dir: &std::path::Path,
    executor: Option<std::path::PathBuf>,
) -> Arc<ListenCtx> {
    use argo_storage::CiRegistry;

    let config = Config::from_parts(
        dir.to_path_buf(),
        dir.join(".argo"),
        0,
        argo_storage::DEFAULT_WORKFLOW_CAPACITY,
        executor,
    );
    std::fs::create_dir_all(&config.templates_path).ok();
    std::fs::create_dir_all(&config.checkpoints_path).ok();
    std::fs::create_dir_all(&config.logs_path).ok();

    Arc::new(ListenCtx {
        config,
        workflows: Arc::new(Mutex::new(WorkflowRegistry::default())),
        cis: Arc::new(Mutex::new(CiHub::new(CiRegistry::default()))),
        channels: Arc::new(ChannelBroker::new()),
        clock: SystemClock,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    })
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
