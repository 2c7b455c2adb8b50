//! History store
//!
//! One `ChannelHistory` per configured channel, each behind its own lock.
//! The channel set is fixed at construction, so the map itself needs no lock;
//! contention is only ever between the writer and readers of one channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;

use super::buffer::ChannelHistory;
use super::HistoryLimit;
use crate::protocol::ChatMessage;

/// Snapshot of one channel's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub capacity: usize,
    pub retained: usize,
    pub evicted: u64,
}

/// Per-channel bounded history for all configured channels
#[derive(Debug)]
pub struct HistoryStore {
    /// Channel name to its buffer
    channels: HashMap<String, Arc<RwLock<ChannelHistory>>>,

    /// Channel names in configuration order (replay order)
    order: Vec<String>,
}

impl HistoryStore {
    /// Create a store with one buffer per `(name, limit)` pair
    ///
    /// A repeated channel name keeps its first limit.
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = (S, HistoryLimit)>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        let mut order = Vec::new();

        for (name, limit) in channels {
            let name = name.into();
            if map.contains_key(&name) {
                tracing::warn!(channel = %name, "Duplicate channel ignored");
                continue;
            }

            let capacity = limit.capacity();
            tracing::debug!(channel = %name, capacity = capacity, "History buffer created");

            map.insert(
                name.clone(),
                Arc::new(RwLock::new(ChannelHistory::new(name.clone(), capacity))),
            );
            order.push(name);
        }

        Self {
            channels: map,
            order,
        }
    }

    /// Append a message to its channel's buffer
    ///
    /// Messages for channels that were never configured are dropped.
    /// Returns true if the message was retained.
    pub async fn append(&self, msg: Arc<ChatMessage>) -> bool {
        let Some(buffer) = self.channels.get(&msg.channel) else {
            tracing::debug!(channel = %msg.channel, "Dropping message for unconfigured channel");
            return false;
        };

        buffer.write().await.push(msg)
    }

    /// The whole retained backlog of `channel`, oldest first
    ///
    /// Unknown channels yield an empty list.
    pub async fn all(&self, channel: &str) -> Vec<Arc<ChatMessage>> {
        match self.channels.get(channel) {
            Some(buffer) => buffer.read().await.all(),
            None => Vec::new(),
        }
    }

    /// Retained messages of `channel` newer than `since`, oldest first
    ///
    /// Unknown channels yield an empty list.
    pub async fn since(&self, channel: &str, since: SystemTime) -> Vec<Arc<ChatMessage>> {
        match self.channels.get(channel) {
            Some(buffer) => buffer.read().await.since(since),
            None => Vec::new(),
        }
    }

    /// Configured channel names in replay order
    pub fn channels(&self) -> &[String] {
        &self.order
    }

    /// Whether `channel` has a history buffer
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Buffer statistics for `channel`
    pub async fn stats(&self, channel: &str) -> Option<HistoryStats> {
        let buffer = self.channels.get(channel)?;
        let buffer = buffer.read().await;
        Some(HistoryStats {
            capacity: buffer.capacity(),
            retained: buffer.len(),
            evicted: buffer.evicted(),
        })
    }
}
