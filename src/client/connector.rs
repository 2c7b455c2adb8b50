//! Bouncer client connection
//!
//! Connects over mutual TLS and speaks the frame protocol. Requests can be
//! sent at any time after `subscribe`; `next_event` yields messages and
//! notices in arrival order.
//!
//! # Example
//! ```no_run
//! use irc_bouncer::client::{BouncerClient, ClientConfig, ClientTlsConfig};
//!
//! # async fn example() -> irc_bouncer::error::Result<()> {
//! let tls = ClientTlsConfig::from_pem_files("ca.crt", "client.crt", "client.key")?;
//! let mut client = BouncerClient::connect(ClientConfig::new("127.0.0.1:50051", tls)).await?;
//!
//! client.subscribe(true).await?;
//! while let Some(event) = client.next_event().await? {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::SystemTime;

use rustls::pki_types::ServerName;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use super::config::ClientConfig;
use crate::error::{ConfigError, Error, Result};
use crate::protocol::{ClientRequest, FrameReader, FrameWriter, ServerEvent};

type Stream = TlsStream<TcpStream>;

/// A connected bouncer client
pub struct BouncerClient {
    reader: FrameReader<ReadHalf<Stream>>,
    writer: FrameWriter<WriteHalf<Stream>>,
    peer_addr: SocketAddr,
}

impl BouncerClient {
    /// Connect and complete the TLS handshake
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let tls_config = config.tls.rustls_config()?;
        let server_name = ServerName::try_from(config.server_name.clone()).map_err(|_| {
            ConfigError::Invalid(format!("invalid server name {:?}", config.server_name))
        })?;
        let connector = TlsConnector::from(tls_config);

        let connect = async {
            let tcp = TcpStream::connect(&config.addr).await?;
            tcp.set_nodelay(true)?;
            let peer_addr = tcp.peer_addr()?;
            let stream = connector.connect(server_name, tcp).await?;
            Ok::<_, Error>((stream, peer_addr))
        };

        let (stream, peer_addr) = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::Timeout("connect"))??;

        tracing::debug!(peer = %peer_addr, "Connected to bouncer");

        let (rd, wr) = tokio::io::split(stream);
        Ok(Self {
            reader: FrameReader::new(rd),
            writer: FrameWriter::new(wr),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Start the stream; must be the first request
    pub async fn subscribe(&mut self, want_history: bool) -> Result<()> {
        self.writer
            .send_request(&ClientRequest::Subscribe { want_history })
            .await
    }

    /// Ask for retained history newer than `since`
    pub async fn replay_history(&mut self, since: SystemTime) -> Result<()> {
        self.writer
            .send_request(&ClientRequest::ReplayHistory { since })
            .await
    }

    /// Ask the bouncer to send `text` to `channel` upstream
    pub async fn send_message(&mut self, channel: &str, text: &str) -> Result<()> {
        self.writer
            .send_request(&ClientRequest::SendMessage {
                channel: channel.to_string(),
                text: text.to_string(),
            })
            .await
    }

    /// Request an administrative shutdown of the bouncer
    pub async fn shutdown(&mut self, password: &str) -> Result<()> {
        self.writer
            .send_request(&ClientRequest::Shutdown {
                password: password.to_string(),
            })
            .await
    }

    /// Next message or notice; `None` once the bouncer closes the stream
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>> {
        self.reader.read_event().await
    }

    /// Close the stream
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await
    }
}
