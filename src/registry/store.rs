//! Broadcast hub implementation
//!
//! The central registry of live subscribers. `publish` walks the registry
//! under a read lock and enqueues the message on every subscriber's queue;
//! it never touches a transport, so a stalled client cannot hold up the
//! others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::HubConfig;
use super::entry::{SubscriberEntry, SubscriberId, Subscription};
use super::error::RegistryError;
use crate::protocol::ChatMessage;

/// Result of one `publish` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    /// Subscribers the message was queued for
    pub delivered: usize,
    /// Subscribers whose queue was already closed
    pub failed: usize,
}

#[derive(Debug, Default)]
struct HubState {
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    closed: bool,
}

/// Registry of live subscriber streams with fan-out
///
/// Thread-safe via `RwLock`. Publishing only needs the read lock, so it runs
/// concurrently with other publishes; register/deregister take the write
/// lock and are therefore ordered against every publish pass.
#[derive(Debug)]
pub struct BroadcastHub {
    state: RwLock<HubState>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// Messages published after this returns are queued for the subscriber.
    /// Fails once the hub has been closed.
    pub async fn register(
        &self,
        identity: impl Into<String>,
    ) -> Result<Subscription, RegistryError> {
        let identity = identity.into();
        let mut state = self.state.write().await;

        if state.closed {
            return Err(RegistryError::Closed);
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (entry, rx) = SubscriberEntry::new(identity, self.config.queue_capacity);

        tracing::info!(
            subscriber = %id,
            identity = %entry.identity,
            subscribers = state.subscribers.len() + 1,
            "Subscriber added"
        );

        state.subscribers.insert(id, entry);
        Ok(Subscription::new(id, rx))
    }

    /// Remove a subscriber
    ///
    /// Safe to call for an id that was never registered or is already gone.
    /// No publish that starts after this returns will reach the subscriber.
    pub async fn deregister(&self, id: SubscriberId) -> bool {
        let mut state = self.state.write().await;

        match state.subscribers.remove(&id) {
            Some(entry) => {
                tracing::debug!(
                    subscriber = %id,
                    identity = %entry.identity,
                    connected_secs = entry.registered_at.elapsed().as_secs(),
                    subscribers = state.subscribers.len(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Queue `msg` for every registered subscriber
    ///
    /// Delivery is independent per subscriber. A closed queue is logged and
    /// counted but does not deregister; that is the owning session's job.
    pub async fn publish(&self, msg: Arc<ChatMessage>) -> PublishReport {
        let state = self.state.read().await;
        let mut report = PublishReport::default();

        for (id, entry) in state.subscribers.iter() {
            if entry.enqueue(Arc::clone(&msg)) {
                report.delivered += 1;
            } else {
                report.failed += 1;
                tracing::warn!(
                    subscriber = %id,
                    identity = %entry.identity,
                    channel = %msg.channel,
                    "Failed to deliver to subscriber: queue closed"
                );
            }
        }

        report
    }

    /// Close the hub: drop every subscriber and refuse new ones
    ///
    /// Sessions observe `Delivery::Closed` once their queue drains.
    /// Returns the number of subscribers dropped.
    pub async fn close(&self) -> usize {
        let mut state = self.state.write().await;
        state.closed = true;
        let dropped = state.subscribers.len();
        state.subscribers.clear();

        tracing::info!(subscribers = dropped, "Broadcast hub closed");
        dropped
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Get the number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    /// Whether `id` is currently registered
    pub async fn is_registered(&self, id: SubscriberId) -> bool {
        self.state.read().await.subscribers.contains_key(&id)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
