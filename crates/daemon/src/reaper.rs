// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SIGCHLD reaping: flag-and-drain.
//!
//! The only signal-time effect is the tokio signal driver's self-pipe
//! wakeup; no allocation, locking, or registry access happens until the
//! watcher task runs. The watcher collects `(pid, status)` pairs via
//! `waitpid(WNOHANG)` onto the exit queue, and the shared-services reap
//! task applies them to the registry — one deterministic point tests can
//! advance.

use crate::channels::ChannelBroker;
use argo_core::{Clock, WorkflowStatus};
use argo_storage::WorkflowRegistry;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A collected child exit.
#[derive(Debug, Clone, Copy)]
pub struct ExitEvent {
    pub pid: i32,
    pub exit_code: i32,
    pub signaled: bool,
}

pub type ExitSender = mpsc::UnboundedSender<ExitEvent>;
pub type ExitReceiver = mpsc::UnboundedReceiver<ExitEvent>;

/// Create the single-producer child-exit queue.
pub fn exit_queue() -> (ExitSender, ExitReceiver) {
    mpsc::unbounded_channel()
}

/// Spawn the SIGCHLD watcher task feeding the exit queue.
pub fn spawn_exit_watcher(tx: ExitSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigchld = match signal(SignalKind::child()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGCHLD handler: {}", e);
                return;
            }
        };

        while sigchld.recv().await.is_some() {
            collect_exits(&tx);
        }
    })
}

/// Drain every pending child exit without blocking.
pub(crate) fn collect_exits(tx: &ExitSender) {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                let _ = tx.send(ExitEvent {
                    pid: pid.as_raw(),
                    exit_code: code,
                    signaled: false,
                });
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                let _ = tx.send(ExitEvent {
                    pid: pid.as_raw(),
                    // shell convention for signal deaths
                    exit_code: 128 + sig as i32,
                    signaled: true,
                });
            }
            // No more exits to collect
            Ok(WaitStatus::StillAlive) => break,
            // Stopped/continued children are not exits
            Ok(_) => continue,
            // ECHILD: no children at all
            Err(_) => break,
        }
    }
}

/// Apply queued exits to the registry. Runs on the shared-services tick.
///
/// For each exit: find the owning workflow, translate the wait status to a
/// terminal status and exit code, remove the entry, and tear down its I/O
/// channel. Returns the number of workflows reaped.
pub fn drain_exits(
    rx: &mut ExitReceiver,
    workflows: &Mutex<WorkflowRegistry>,
    channels: &ChannelBroker,
    clock: &impl Clock,
) -> usize {
    let mut reaped = 0;

    while let Ok(exit) = rx.try_recv() {
        let removed = {
            let mut registry = workflows.lock();
            let Some(wf) = registry.find_by_pid(exit.pid) else {
                debug!(pid = exit.pid, "exit for pid with no workflow");
                continue;
            };
            let workflow_id = wf.workflow_id.clone();

            let status = if exit.exit_code == 0 {
                WorkflowStatus::Completed
            } else {
                WorkflowStatus::Failed
            };
            let now_ms = clock.epoch_ms();
            // mark_ended preserves an abandoned status (terminal monotone)
            registry.update(&workflow_id, |w| {
                w.mark_ended(status, Some(exit.exit_code), now_ms)
            });
            registry.remove(&workflow_id)
        };

        if let Some(wf) = removed {
            channels.destroy(&wf.workflow_id);
            info!(
                workflow_id = %wf.workflow_id,
                status = %wf.status,
                exit_code = exit.exit_code,
                signaled = exit.signaled,
                "reaped workflow executor"
            );
            reaped += 1;
        }
    }

    reaped
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
