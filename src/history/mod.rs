//! Per-channel message history
//!
//! Each configured channel gets a bounded FIFO of its most recent messages.
//! The ingress appends, sessions replay; eviction and insertion happen under
//! the channel's write lock so a reader never sees one without the other.

pub mod buffer;
pub mod store;

pub use buffer::ChannelHistory;
pub use store::{HistoryStats, HistoryStore};

use crate::protocol::constants::DEFAULT_HISTORY_LIMIT;

/// History retention for one channel
///
/// `Default` is "not configured" and is distinct from `Limited(0)`, which
/// retains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryLimit {
    /// Use `DEFAULT_HISTORY_LIMIT`
    #[default]
    Default,
    /// Keep at most this many messages
    Limited(usize),
}

impl HistoryLimit {
    /// Resolved buffer capacity
    pub fn capacity(self) -> usize {
        match self {
            HistoryLimit::Default => DEFAULT_HISTORY_LIMIT,
            HistoryLimit::Limited(n) => n,
        }
    }
}

impl From<Option<usize>> for HistoryLimit {
    fn from(limit: Option<usize>) -> Self {
        match limit {
            Some(n) => HistoryLimit::Limited(n),
            None => HistoryLimit::Default,
        }
    }
}
