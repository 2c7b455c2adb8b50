//! Ingress adapter
//!
//! The single entry point the upstream side uses to hand messages to the
//! core, and the queue through which clients ask for messages to be sent
//! upstream.
//!
//! ```text
//!   upstream ──publish()──► IngressAdapter ──► HistoryStore.append()
//!                                 │        └─► BroadcastHub.publish()
//!                                 │
//!   session ──request_send()──────┴──► OutboundReceiver ──► upstream
//! ```
//!
//! Publishes are serialized: the sequence number, the history append and the
//! hub fan-out for one message all happen before the next message starts, so
//! history order and delivery order agree.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, Mutex};

use crate::history::HistoryStore;
use crate::protocol::codec::max_content_len;
use crate::protocol::ChatMessage;
use crate::registry::BroadcastHub;
use crate::stats::ServerStats;

/// Capacity of the outbound (to-upstream) queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// A client's request to say something upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
    /// Identity of the client that asked
    pub requested_by: String,
}

/// Receiving half of the outbound queue, held by the upstream adapter
pub type OutboundReceiver = mpsc::Receiver<OutboundMessage>;

/// Why an outbound request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundError {
    /// The channel is not one the bouncer is configured for
    UnknownChannel(String),
    /// No upstream adapter is attached to the outbound queue
    Unavailable,
    /// The outbound queue is full
    Busy,
}

impl fmt::Display for OutboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundError::UnknownChannel(channel) => {
                write!(f, "cannot send to {}: channel not configured", channel)
            }
            OutboundError::Unavailable => write!(f, "cannot send: no upstream connection"),
            OutboundError::Busy => write!(f, "cannot send: upstream queue full"),
        }
    }
}

impl std::error::Error for OutboundError {}

/// Couples the history store and the broadcast hub behind one `publish`
#[derive(Debug)]
pub struct IngressAdapter {
    history: Arc<HistoryStore>,
    hub: Arc<BroadcastHub>,
    stats: Arc<ServerStats>,
    /// Last assigned sequence number; the lock orders whole publishes
    last_seq: Mutex<u64>,
    outbound: mpsc::Sender<OutboundMessage>,
}

impl IngressAdapter {
    /// Create the adapter and the receiver for outbound requests
    ///
    /// Dropping the receiver makes every later `request_send` fail with
    /// `OutboundError::Unavailable`.
    pub fn new(
        history: Arc<HistoryStore>,
        hub: Arc<BroadcastHub>,
        stats: Arc<ServerStats>,
    ) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        let adapter = Self {
            history,
            hub,
            stats,
            last_seq: Mutex::new(0),
            outbound: tx,
        };

        (adapter, rx)
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Record and fan out one upstream message
    ///
    /// Never fails: a full history evicts, an unknown channel skips history,
    /// and per-subscriber failures are counted, not returned. Content too
    /// long for one frame is cut at a character boundary.
    pub async fn publish(
        &self,
        channel: impl Into<String>,
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: SystemTime,
    ) -> Arc<ChatMessage> {
        let (channel, sender) = (channel.into(), sender.into());
        let mut content = content.into();
        truncate_to_frame(&channel, &sender, &mut content);

        let mut last_seq = self.last_seq.lock().await;
        *last_seq += 1;

        let msg = Arc::new(ChatMessage::new(channel, sender, content, timestamp).with_seq(*last_seq));

        self.history.append(Arc::clone(&msg)).await;
        let report = self.hub.publish(Arc::clone(&msg)).await;
        drop(last_seq);

        self.stats.record_publish(report);

        tracing::trace!(
            channel = %msg.channel,
            sender = %msg.sender,
            seq = msg.seq,
            delivered = report.delivered,
            "Message published"
        );

        msg
    }

    /// Queue a client's message for the upstream adapter
    pub fn request_send(
        &self,
        channel: &str,
        text: &str,
        requested_by: &str,
    ) -> Result<(), OutboundError> {
        if !self.history.contains(channel) {
            return Err(OutboundError::UnknownChannel(channel.to_string()));
        }

        let request = OutboundMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            requested_by: requested_by.to_string(),
        };

        self.outbound.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OutboundError::Busy,
            mpsc::error::TrySendError::Closed(_) => OutboundError::Unavailable,
        })?;

        tracing::debug!(channel = %channel, requested_by = %requested_by, "Outbound message queued");
        Ok(())
    }
}

fn truncate_to_frame(channel: &str, sender: &str, content: &mut String) {
    let limit = max_content_len(channel, sender);
    if content.len() <= limit {
        return;
    }

    let mut cut = limit;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    tracing::warn!(
        channel = %channel,
        sender = %sender,
        length = content.len(),
        kept = cut,
        "Message content truncated to fit one frame"
    );
    content.truncate(cut);
}
