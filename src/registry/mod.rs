//! Subscriber registry and broadcast hub
//!
//! The hub tracks every live downstream stream and fans each published
//! message out to all of them.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<BroadcastHub>
//!                  ┌─────────────────────────────┐
//!                  │ subscribers: HashMap<Id,    │
//!                  │   SubscriberEntry {         │
//!                  │     identity,               │
//!                  │     tx: broadcast::Tx,      │
//!                  │   }                         │
//!                  │ >                           │
//!                  └──────────────┬──────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//!       ▼                         ▼                         ▼
//!   [Ingress]               [Session A]               [Session B]
//!   publish()               sub.recv()                sub.recv()
//!       │                         │                         │
//!       └──► hub.publish() ──► queue ──► send_message() ──► TLS
//! ```
//!
//! # Per-subscriber queues
//!
//! Each subscriber has its own bounded queue, drained by its own session.
//! The publish pass only enqueues, so a slow or stalled client affects
//! nobody else. Messages are `Arc<ChatMessage>`: every queue and the history
//! buffer share one allocation per message.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::{HubConfig, OverflowPolicy};
pub use entry::{Delivery, SubscriberEntry, SubscriberId, Subscription};
pub use error::RegistryError;
pub use store::{BroadcastHub, PublishReport};
