// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-services scheduler: one background worker running periodic
//! maintenance tasks (registry flush, heartbeat sweep, exit-queue drain,
//! prune).
//!
//! Task callbacks run with the table lock released; a per-task mutex keeps
//! invocations of one task serialized even when a test drives `tick_once`
//! alongside the worker. Stop is cooperative: set the flag, join, and any
//! in-flight invocation completes first.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// How often the worker scans the task table.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum registered tasks.
pub const MAX_TASKS: usize = 32;

/// Errors from task registration.
#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("task table full ({MAX_TASKS} tasks)")]
    TableFull,
}

type TaskFn = Box<dyn FnMut() + Send>;

struct TaskEntry {
    name: &'static str,
    interval: Duration,
    last_run: Option<Instant>,
    enabled: bool,
    callback: Arc<Mutex<TaskFn>>,
}

/// Run every due enabled task once, invoking callbacks with the table
/// lock released.
fn run_due_tasks(tasks: &Mutex<Vec<TaskEntry>>, runs: &AtomicU64) {
    let now = Instant::now();

    let due: Vec<(usize, &'static str, Arc<Mutex<TaskFn>>)> = {
        let table = tasks.lock();
        table
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.enabled
                    && t.last_run
                        .map(|last| now.duration_since(last) >= t.interval)
                        .unwrap_or(true)
            })
            .map(|(i, t)| (i, t.name, Arc::clone(&t.callback)))
            .collect()
    };

    for (index, name, callback) in due {
        {
            let mut callback = callback.lock();
            (*callback)();
        }
        runs.fetch_add(1, Ordering::SeqCst);

        let mut table = tasks.lock();
        if let Some(task) = table.get_mut(index) {
            if task.name == name {
                task.last_run = Some(now);
            }
        }
    }
}

/// Background worker over a dynamic table of periodic tasks.
pub struct SharedServices {
    tasks: Arc<Mutex<Vec<TaskEntry>>>,
    runs: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    check_interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl SharedServices {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            runs: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            check_interval,
            handle: None,
        }
    }

    /// Register a periodic task. The first invocation happens on the first
    /// scan after registration.
    pub fn register(
        &self,
        name: &'static str,
        interval: Duration,
        callback: impl FnMut() + Send + 'static,
    ) -> Result<(), ServicesError> {
        let mut tasks = self.tasks.lock();
        if tasks.len() >= MAX_TASKS {
            return Err(ServicesError::TableFull);
        }
        tasks.push(TaskEntry {
            name,
            interval,
            last_run: None,
            enabled: true,
            callback: Arc::new(Mutex::new(Box::new(callback))),
        });
        debug!(
            task = name,
            interval_ms = interval.as_millis() as u64,
            "registered task"
        );
        Ok(())
    }

    /// Enable or disable a task by name. Returns false for unknown names.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut tasks = self.tasks.lock();
        match tasks.iter_mut().find(|t| t.name == name) {
            Some(task) => {
                task.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Total task invocations across the scheduler's lifetime.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run every due enabled task once. Used by the worker on each scan and
    /// by tests to advance deterministically.
    pub fn tick_once(&self) {
        run_due_tasks(&self.tasks, &self.runs);
    }

    /// Spawn the background worker.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("shared services already started");
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);

        let tasks = Arc::clone(&self.tasks);
        let runs = Arc::clone(&self.runs);
        let shutdown = Arc::clone(&self.shutdown);
        let check_interval = self.check_interval;

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            loop {
                interval.tick().await;
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                run_due_tasks(&tasks, &runs);
            }
            debug!("shared services worker stopped");
        }));
    }

    /// Cooperative stop: flag the worker and join it.
    pub async fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("shared services worker panicked: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
