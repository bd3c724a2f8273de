// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow I/O channels for interactive HTTP chat.
//!
//! Each supervised workflow gets two bounded queues: `input` carries
//! client messages to the executor, `output` carries executor messages
//! back. The supervisor creates the channel on start; the reaper destroys
//! it when the workflow is removed.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Maximum queued messages per direction.
pub const CHANNEL_CAPACITY: usize = 256;

/// Errors from channel operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no channel for workflow")]
    NoChannel,

    #[error("channel full ({CHANNEL_CAPACITY} messages)")]
    Full,
}

#[derive(Debug, Default)]
struct IoChannel {
    input: VecDeque<String>,
    output: VecDeque<String>,
}

/// Broker owning the channels of all active workflows.
#[derive(Debug, Default)]
pub struct ChannelBroker {
    channels: Mutex<HashMap<String, IoChannel>>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel for a workflow. Idempotent.
    pub fn create(&self, workflow_id: &str) {
        self.channels
            .lock()
            .entry(workflow_id.to_string())
            .or_default();
    }

    /// Tear down a workflow's channel, dropping queued messages.
    pub fn destroy(&self, workflow_id: &str) -> bool {
        self.channels.lock().remove(workflow_id).is_some()
    }

    pub fn exists(&self, workflow_id: &str) -> bool {
        self.channels.lock().contains_key(workflow_id)
    }

    pub fn push_input(&self, workflow_id: &str, message: String) -> Result<(), ChannelError> {
        self.push(workflow_id, message, |c| &mut c.input)
    }

    pub fn push_output(&self, workflow_id: &str, message: String) -> Result<(), ChannelError> {
        self.push(workflow_id, message, |c| &mut c.output)
    }

    pub fn pop_input(&self, workflow_id: &str) -> Result<Option<String>, ChannelError> {
        self.pop(workflow_id, |c| &mut c.input)
    }

    pub fn pop_output(&self, workflow_id: &str) -> Result<Option<String>, ChannelError> {
        self.pop(workflow_id, |c| &mut c.output)
    }

    fn push(
        &self,
        workflow_id: &str,
        message: String,
        queue: impl FnOnce(&mut IoChannel) -> &mut VecDeque<String>,
    ) -> Result<(), ChannelError> {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(workflow_id).ok_or(ChannelError::NoChannel)?;
        let queue = queue(channel);
        if queue.len() >= CHANNEL_CAPACITY {
            return Err(ChannelError::Full);
        }
        queue.push_back(message);
        Ok(())
    }

    fn pop(
        &self,
        workflow_id: &str,
        queue: impl FnOnce(&mut IoChannel) -> &mut VecDeque<String>,
    ) -> Result<Option<String>, ChannelError> {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(workflow_id).ok_or(ChannelError::NoChannel)?;
        Ok(queue(channel).pop_front())
    }
}

#[cfg(test)]
#[path = "channels_tests.rs"]
mod tests;
