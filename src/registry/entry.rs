//! Subscriber entry and subscription handle
//!
//! The hub keeps the sending half of each subscriber's queue; the session
//! owns the receiving half. Each queue is a single-receiver
//! `tokio::sync::broadcast` channel: sends never block, and a receiver that
//! falls behind loses the oldest messages and is told how many.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::protocol::ChatMessage;

/// Unique identifier for a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Hub-side state for one subscriber
#[derive(Debug)]
pub struct SubscriberEntry {
    /// Verified client identity (certificate CN)
    pub identity: String,

    /// Sending half of the subscriber's queue
    pub(super) tx: broadcast::Sender<Arc<ChatMessage>>,

    /// When the subscriber was registered
    pub registered_at: Instant,
}

impl SubscriberEntry {
    pub(super) fn new(identity: String, capacity: usize) -> (Self, broadcast::Receiver<Arc<ChatMessage>>) {
        let (tx, rx) = broadcast::channel(capacity);
        let entry = Self {
            identity,
            tx,
            registered_at: Instant::now(),
        };
        (entry, rx)
    }

    /// Queue a message for this subscriber
    ///
    /// Fails only when the receiving session is gone.
    pub(super) fn enqueue(&self, msg: Arc<ChatMessage>) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Messages queued but not yet taken by the session
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

/// Outcome of waiting on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Next message in publish order
    Message(Arc<ChatMessage>),
    /// The queue overflowed and this many oldest messages were lost
    Lagged(u64),
    /// The hub dropped this subscriber (deregistered or shut down)
    Closed,
}

/// Session-side handle returned by `BroadcastHub::register`
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: broadcast::Receiver<Arc<ChatMessage>>,
}

impl Subscription {
    pub(super) fn new(id: SubscriberId, rx: broadcast::Receiver<Arc<ChatMessage>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next delivery. Cancel safe.
    pub async fn recv(&mut self) -> Delivery {
        match self.rx.recv().await {
            Ok(msg) => Delivery::Message(msg),
            Err(broadcast::error::RecvError::Lagged(n)) => Delivery::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => Delivery::Closed,
        }
    }

    /// Non-blocking variant of `recv`; `None` when nothing is queued
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.rx.try_recv() {
            Ok(msg) => Some(Delivery::Message(msg)),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(Delivery::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Some(Delivery::Closed),
            Err(broadcast::error::TryRecvError::Empty) => None,
        }
    }
}
