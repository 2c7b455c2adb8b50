//! Bouncer server: configuration and the mTLS listener

pub mod config;
pub mod listener;

pub use config::{ChannelConfig, ServerConfig, TlsPaths};
pub use listener::BouncerServer;
