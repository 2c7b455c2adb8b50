//! Broadcast hub configuration

use crate::protocol::constants::DEFAULT_SUBSCRIBER_QUEUE;

/// What happens when a subscriber's queue overflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Oldest queued messages are discarded; the client gets a notice with
    /// the number lost and stays connected
    #[default]
    DropOldest,
    /// The session is closed as a slow consumer
    Disconnect,
}

impl OverflowPolicy {
    /// Parse the configuration spelling (`drop-oldest` / `disconnect`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "drop-oldest" | "drop_oldest" => Some(OverflowPolicy::DropOldest),
            "disconnect" => Some(OverflowPolicy::Disconnect),
            _ => None,
        }
    }
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber outbound queue depth
    pub queue_capacity: usize,

    /// Policy applied when a subscriber falls `queue_capacity` behind
    pub overflow_policy: OverflowPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_SUBSCRIBER_QUEUE,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl HubConfig {
    /// Set the per-subscriber queue depth (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_SUBSCRIBER_QUEUE);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_queue_capacity_floor() {
        assert_eq!(HubConfig::default().queue_capacity(0).queue_capacity, 1);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(
            OverflowPolicy::from_name("disconnect"),
            Some(OverflowPolicy::Disconnect)
        );
        assert_eq!(
            OverflowPolicy::from_name("drop-oldest"),
            Some(OverflowPolicy::DropOldest)
        );
        assert_eq!(OverflowPolicy::from_name("block"), None);
    }
}
