//! Per-channel history buffer
//!
//! Holds the most recent `capacity` messages of one channel, oldest first.
//! New subscribers replay it so they see recent conversation before the live
//! tail starts.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use crate::protocol::ChatMessage;

/// Bounded FIFO of recent messages for a single channel
#[derive(Debug)]
pub struct ChannelHistory {
    /// Channel name
    name: String,
    /// Maximum retained messages (0 = retain nothing)
    capacity: usize,
    /// Retained messages, oldest first
    messages: VecDeque<Arc<ChatMessage>>,
    /// Messages evicted to make room since creation
    evicted: u64,
}

impl ChannelHistory {
    /// Create an empty buffer for `name` holding at most `capacity` messages
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            // Don't preallocate huge limits up front
            messages: VecDeque::with_capacity(capacity.min(1024)),
            evicted: 0,
        }
    }

    /// Append a message, evicting the oldest one if the buffer is full
    ///
    /// Returns false when nothing was stored (capacity 0).
    pub fn push(&mut self, msg: Arc<ChatMessage>) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
            self.evicted += 1;
        }
        self.messages.push_back(msg);
        true
    }

    /// Every retained message, oldest first, whatever its timestamp
    pub fn all(&self) -> Vec<Arc<ChatMessage>> {
        self.messages.iter().cloned().collect()
    }

    /// All retained messages with a timestamp strictly after `since`
    pub fn since(&self, since: SystemTime) -> Vec<Arc<ChatMessage>> {
        self.messages
            .iter()
            .filter(|msg| msg.timestamp > since)
            .cloned()
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages evicted since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Timestamps of the oldest and newest retained messages
    pub fn timestamp_range(&self) -> Option<(SystemTime, SystemTime)> {
        let first = self.messages.front()?.timestamp;
        let last = self.messages.back()?.timestamp;
        Some((first, last))
    }
}
