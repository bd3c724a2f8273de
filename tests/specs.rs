//! Behavioral specifications for the argo daemon.
//!
//! These tests are black-box: they spawn a real `argod` with a temporary
//! HOME and a stub executor, then drive the HTTP API and verify status
//! codes, bodies, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// daemon/
#[path = "specs/daemon/cis.rs"]
mod daemon_cis;
#[path = "specs/daemon/health.rs"]
mod daemon_health;
#[path = "specs/daemon/help.rs"]
mod daemon_help;
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
#[path = "specs/daemon/workflows.rs"]
mod daemon_workflows;
