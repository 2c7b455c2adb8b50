//! Message types carried between the bouncer and its clients
//!
//! `ChatMessage` is the unit stored in history and fanned out to subscribers.
//! It is immutable once published and shared behind an `Arc`, so history and
//! every subscriber queue point at the same allocation.

use std::sync::Arc;
use std::time::SystemTime;

/// A chat line observed on the upstream network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Publish sequence number, assigned by the ingress. Not sent on the wire.
    pub seq: u64,
    /// When the upstream event was observed
    pub timestamp: SystemTime,
    /// Channel name (e.g. "#rust")
    pub channel: String,
    /// Nick of the sender
    pub sender: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create an unsequenced message
    pub fn new(
        channel: impl Into<String>,
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            seq: 0,
            timestamp,
            channel: channel.into(),
            sender: sender.into(),
            content: content.into(),
        }
    }

    pub(crate) fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }
}

/// Requests a client sends to the bouncer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Must be the first frame on every stream
    Subscribe { want_history: bool },
    /// Dump retained history newer than `since` (UNIX_EPOCH for everything)
    ReplayHistory { since: SystemTime },
    /// Ask the bouncer to say something upstream
    SendMessage { channel: String, text: String },
    /// Administrative shutdown of the whole service
    Shutdown { password: String },
}

impl ClientRequest {
    /// Short name used in logs and protocol errors
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::Subscribe { .. } => "Subscribe",
            ClientRequest::ReplayHistory { .. } => "ReplayHistory",
            ClientRequest::SendMessage { .. } => "SendMessage",
            ClientRequest::Shutdown { .. } => "Shutdown",
        }
    }
}

/// Events the bouncer pushes to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A chat message, live or replayed
    Message(Arc<ChatMessage>),
    /// Out-of-band text from the bouncer itself
    Notice(String),
}

impl ServerEvent {
    /// Returns the chat message if this is one
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            ServerEvent::Message(msg) => Some(msg),
            ServerEvent::Notice(_) => None,
        }
    }
}
