//! Bouncer client
//!
//! Library side of a downstream client: connect with a client certificate,
//! subscribe, and read the event stream.

pub mod config;
pub mod connector;

pub use config::{ClientConfig, ClientTlsConfig};
pub use connector::BouncerClient;
