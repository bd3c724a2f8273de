//! Test helpers for behavioral specifications.
//!
//! Provides a high-level harness around a spawned `argod` process.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Spec polling knobs.
pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 3_000;

/// Self-terminating stub executor (scenario-style "simple_test").
pub const QUICK_EXECUTOR: &str = "sleep 0.3\nexit 0";

/// Long-running stub that ignores pause/resume signals like a real executor.
pub const LONG_EXECUTOR: &str = "trap '' USR1 USR2\nsleep 30";

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale (e.g. compiled into a shared target dir).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where argod is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the argod daemon binary.
pub fn argod_binary() -> PathBuf {
    binary_path("argod")
}

/// Pick a free loopback port.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll until `check` passes or the budget runs out.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
    }
    false
}

/// A running daemon rooted in a temporary HOME.
pub struct DaemonHarness {
    child: Option<Child>,
    pub port: u16,
    pub home: TempDir,
    client: reqwest::blocking::Client,
}

impl DaemonHarness {
    /// Start a daemon with the quick self-terminating stub executor.
    pub fn start() -> Self {
        Self::start_with_executor(QUICK_EXECUTOR)
    }

    /// Start a daemon whose stub executor runs `body` (a shell script).
    pub fn start_with_executor(body: &str) -> Self {
        let home = TempDir::new().unwrap();
        let port = free_port();
        write_stub_executor(home.path(), body);
        write_template(home.path(), "simple_test");
        Self::spawn(home, port)
    }

    /// Start a daemon reusing an existing HOME and port (restart tests).
    pub fn restart(home: TempDir, port: u16) -> Self {
        Self::spawn(home, port)
    }

    fn spawn(home: TempDir, port: u16) -> Self {
        let child = Command::new(argod_binary())
            .args(["--port", &port.to_string()])
            .env("HOME", home.path())
            .env(
                "ARGO_WORKFLOW_EXECUTOR",
                home.path().join("stub_executor"),
            )
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let harness = Self {
            child: Some(child),
            port,
            home,
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        };

        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || harness.is_healthy()),
            "daemon did not become healthy on port {port}"
        );
        harness
    }

    pub fn is_healthy(&self) -> bool {
        self.client
            .get(self.url("/api/health"))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn get(&self, path: &str) -> (u16, serde_json::Value) {
        let response = self.client.get(self.url(path)).send().unwrap();
        decode(response)
    }

    pub fn post(&self, path: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .unwrap();
        decode(response)
    }

    pub fn post_empty(&self, path: &str) -> (u16, serde_json::Value) {
        let response = self.client.post(self.url(path)).send().unwrap();
        decode(response)
    }

    pub fn delete(&self, path: &str) -> (u16, serde_json::Value) {
        let response = self.client.delete(self.url(path)).send().unwrap();
        decode(response)
    }

    /// Start a workflow from the stock template, asserting success.
    pub fn start_workflow(&self, instance: &str) -> String {
        let (status, body) = self.post(
            "/api/workflow/start",
            serde_json::json!({
                "template": "simple_test",
                "instance": instance,
                "branch": "main",
                "environment": "dev",
            }),
        );
        assert_eq!(status, 200, "start failed: {body}");
        body["workflow_id"].as_str().unwrap().to_string()
    }

    /// Request shutdown via the API and wait for a clean exit.
    /// Returns the HOME so restart tests can reuse it.
    pub fn shutdown(mut self) -> TempDir {
        let (status, _) = self.post_empty("/api/shutdown");
        assert_eq!(status, 200);

        let mut child = self.child.take().unwrap();
        let exited = wait_for(SPEC_WAIT_MAX_MS, || {
            child.try_wait().map(|s| s.is_some()).unwrap_or(false)
        });
        assert!(exited, "daemon did not exit after shutdown request");
        let status = child.wait().unwrap();
        assert!(status.success(), "daemon exited non-zero: {status:?}");

        // Move HOME out without running the kill-on-drop path
        let placeholder = TempDir::new().unwrap();
        std::mem::replace(&mut self.home, placeholder)
    }

    /// PID of the daemon process.
    pub fn pid(&self) -> u32 {
        self.child.as_ref().unwrap().id()
    }

    /// Wait for the daemon process to exit on its own.
    pub fn wait_exited(&mut self, max_ms: u64) -> bool {
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        wait_for(max_ms, || {
            child.try_wait().map(|s| s.is_some()).unwrap_or(false)
        })
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn decode(response: reqwest::blocking::Response) -> (u16, serde_json::Value) {
    let status = response.status().as_u16();
    let body = response
        .json::<serde_json::Value>()
        .unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// Write the stub executor script into HOME.
pub fn write_stub_executor(home: &Path, body: &str) {
    let path = home.join("stub_executor");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
}

/// Write a minimal workflow template into HOME.
pub fn write_template(home: &Path, name: &str) {
    let dir = home.join(".argo/workflows/templates");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{name}.json")),
        serde_json::json!({
            "steps": [
                {"step": "greet", "type": "display", "prompt": "hello"},
                {"step": "finish", "type": "display", "prompt": "bye"}
            ]
        })
        .to_string(),
    )
    .unwrap();
}
