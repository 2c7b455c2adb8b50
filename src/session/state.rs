//! Session state machine
//!
//! Tracks one subscriber stream from the first frame to teardown.
//!
//! ```text
//! AwaitingSubscribe ──► ReplayingHistory ──► Live
//!         │                    │              │
//!         └────────────────────┴──────────────┴──► Closed
//! ```
//!
//! `ReplayingHistory` is skipped when the client did not ask for history.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Authenticated, waiting for the Subscribe frame
    AwaitingSubscribe,
    /// Sending the initial history dump
    ReplayingHistory,
    /// Forwarding live messages and serving control requests
    Live,
    /// Terminal
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time (after the TLS handshake)
    pub connected_at: Instant,

    /// When the Subscribe frame arrived
    pub subscribed_at: Option<Instant>,

    /// Whether the client asked for history on subscribe
    pub want_history: bool,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::AwaitingSubscribe,
            connected_at: Instant::now(),
            subscribed_at: None,
            want_history: false,
        }
    }

    /// Handle the Subscribe frame
    pub fn on_subscribe(&mut self, want_history: bool) {
        if self.phase != SessionPhase::AwaitingSubscribe {
            return;
        }
        self.subscribed_at = Some(Instant::now());
        self.want_history = want_history;
        self.phase = if want_history {
            SessionPhase::ReplayingHistory
        } else {
            SessionPhase::Live
        };
    }

    /// Initial replay finished
    pub fn complete_replay(&mut self) {
        if self.phase == SessionPhase::ReplayingHistory {
            self.phase = SessionPhase::Live;
        }
    }

    /// Enter the terminal phase
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Check if session is live
    pub fn is_live(&self) -> bool {
        self.phase == SessionPhase::Live
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
