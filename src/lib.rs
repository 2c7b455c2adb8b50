//! IRC bouncer core
//!
//! Keeps a bounded per-channel history of chat lines observed upstream and
//! streams them, followed by live traffic, to downstream clients over
//! mutually authenticated TLS.
//!
//! ```text
//!   upstream ──► IngressAdapter ──► HistoryStore
//!                      │
//!                      └──────────► BroadcastHub ──► Session ──► client (mTLS)
//!                                        ▲               │
//!                                        └── register ───┘
//! ```
//!
//! # Example
//! ```no_run
//! use std::time::SystemTime;
//! use irc_bouncer::{BouncerServer, ServerConfig};
//!
//! # async fn example() -> irc_bouncer::Result<()> {
//! let config = ServerConfig::from_file("bouncer.toml")?;
//! let (server, _outbound) = BouncerServer::new(config)?;
//!
//! let ingress = server.ingress().clone();
//! tokio::spawn(async move {
//!     ingress.publish("#rust", "ferris", "hello", SystemTime::now()).await;
//! });
//!
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod history;
pub mod ingress;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stats;

pub use auth::{ClientIdentity, IdentityGate};
pub use error::{Error, Result};
pub use history::{HistoryLimit, HistoryStore};
pub use ingress::{IngressAdapter, OutboundMessage, OutboundReceiver};
pub use protocol::{ChatMessage, ClientRequest, ServerEvent};
pub use registry::{BroadcastHub, OverflowPolicy};
pub use server::{BouncerServer, ServerConfig};
pub use shutdown::ShutdownSignal;
