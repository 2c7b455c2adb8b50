//! Session context
//!
//! Identifies one authenticated stream in logs and carries its counters.

use std::net::SocketAddr;

use crate::auth::ClientIdentity;
use crate::stats::SessionStats;

/// Read-only facts about a session plus its running statistics
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Identity admitted by the gate
    pub identity: ClientIdentity,

    /// Current session statistics
    pub stats: SessionStats,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr, identity: ClientIdentity) -> Self {
        Self {
            session_id,
            peer_addr,
            identity,
            stats: SessionStats::default(),
        }
    }

    pub fn identity(&self) -> &str {
        self.identity.as_str()
    }
}
