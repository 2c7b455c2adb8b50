//! Statistics for the bouncer and its sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::registry::PublishReport;

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Control requests received after Subscribe
    pub requests: u64,
    /// Messages sent from history (initial replay and on-demand)
    pub history_sent: u64,
    /// Live messages sent
    pub live_sent: u64,
    /// Live messages suppressed because the replay already covered them
    pub duplicates_skipped: u64,
    /// System notices sent
    pub notices_sent: u64,
    /// Messages lost to queue overflow
    pub dropped: u64,
    /// Session duration
    pub duration: Duration,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat messages written to the client, replayed or live
    pub fn messages_sent(&self) -> u64 {
        self.history_sent + self.live_sent
    }
}

/// Server-wide counters
///
/// Shared by the listener, every session and the ingress; all updates are
/// relaxed atomic increments.
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    unauthorized: AtomicU64,
    active_sessions: AtomicU64,
    messages_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    dropped_messages: AtomicU64,
}

/// Point-in-time copy of `ServerStats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections that completed the TLS handshake
    pub connections_accepted: u64,
    /// Connections refused for the connection limit
    pub connections_rejected: u64,
    /// Handshakes rejected by the identity gate
    pub unauthorized: u64,
    /// Sessions currently running
    pub active_sessions: u64,
    /// Messages published through the ingress
    pub messages_published: u64,
    /// Per-subscriber enqueues
    pub deliveries: u64,
    /// Enqueues that hit a closed queue
    pub delivery_failures: u64,
    /// Messages lost to slow consumers
    pub dropped_messages: u64,
    /// Time since the stats were created
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            unauthorized: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            dropped_messages: AtomicU64::new(0),
        }
    }

    pub fn record_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        // Saturating: a close without a matching open must not wrap
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Account for one ingress publish
    pub fn record_publish(&self, report: PublishReport) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped_messages.fetch_add(count, Ordering::Relaxed);
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_new() {
        let stats = SessionStats::new();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.history_sent, 0);
        assert_eq!(stats.live_sent, 0);
        assert_eq!(stats.notices_sent, 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.messages_sent(), 0);
    }

    #[test]
    fn test_session_stats_messages_sent() {
        let mut stats = SessionStats::new();
        stats.history_sent = 2;
        stats.live_sent = 5;
        stats.duplicates_skipped = 1;

        assert_eq!(stats.messages_sent(), 7);
    }

    #[test]
    fn test_server_stats_new() {
        let snapshot = ServerStats::new().snapshot();
        assert_eq!(snapshot.connections_accepted, 0);
        assert_eq!(snapshot.unauthorized, 0);
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(snapshot.dropped_messages, 0);
    }

    #[test]
    fn test_server_stats_publish() {
        let stats = ServerStats::new();
        stats.record_publish(PublishReport {
            delivered: 3,
            failed: 1,
        });
        stats.record_publish(PublishReport {
            delivered: 2,
            failed: 0,
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_published, 2);
        assert_eq!(snapshot.deliveries, 5);
        assert_eq!(snapshot.delivery_failures, 1);
    }

    #[test]
    fn test_server_stats_sessions() {
        let stats = ServerStats::new();
        stats.session_opened();
        stats.session_opened();
        stats.session_closed();
        assert_eq!(stats.active_sessions(), 1);

        stats.session_closed();
        stats.session_closed();
        assert_eq!(stats.active_sessions(), 0);
    }

    #[test]
    fn test_server_stats_connections() {
        let stats = ServerStats::new();
        stats.record_accepted();
        stats.record_rejected();
        stats.record_unauthorized();
        stats.record_unauthorized();
        stats.record_dropped(7);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 1);
        assert_eq!(snapshot.connections_rejected, 1);
        assert_eq!(snapshot.unauthorized, 2);
        assert_eq!(snapshot.dropped_messages, 7);
    }
}
