//! Server configuration
//!
//! `ServerConfig` is built in code with chained setters, or loaded from a
//! TOML file:
//!
//! ```toml
//! [service]
//! host = "0.0.0.0"
//! port = 50051
//! admin_password = "secret"
//! queue_capacity = 1024
//! overflow_policy = "drop-oldest"   # or "disconnect"
//!
//! [tls]
//! ca_file = "ca.crt"
//! cert_file = "server.crt"
//! key_file = "server.key"
//! client_cn = "client_user"
//!
//! [[channels]]
//! name = "#rust"
//! history_limit = 50                 # omit for the default of 100
//! ```
//!
//! Sections this crate does not know about (such as the upstream `[irc]`
//! settings) are ignored.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::history::HistoryLimit;
use crate::protocol::constants::{DEFAULT_PORT, DEFAULT_SUBSCRIBER_QUEUE};
use crate::registry::{HubConfig, OverflowPolicy};

/// One channel the bouncer keeps history for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub name: String,
    pub history_limit: HistoryLimit,
}

impl ChannelConfig {
    /// Channel with the default history limit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history_limit: HistoryLimit::Default,
        }
    }

    /// Set the history limit
    pub fn history_limit(mut self, limit: HistoryLimit) -> Self {
        self.history_limit = limit;
        self
    }
}

/// PEM files for the server side of mTLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    /// CA that signs client certificates
    pub ca_file: PathBuf,
    /// Server certificate chain
    pub cert_file: PathBuf,
    /// Server private key
    pub key_file: PathBuf,
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// The TLS handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Per-subscriber outbound queue depth
    pub subscriber_queue_capacity: usize,

    /// What to do with a subscriber whose queue overflows
    pub overflow_policy: OverflowPolicy,

    /// How long shutdown waits for sessions before aborting them
    pub drain_timeout: Duration,

    /// The only certificate CN admitted
    pub client_identity: String,

    /// Password authorizing administrative shutdown (None = always denied)
    pub admin_password: Option<String>,

    /// Channels with history, in replay order
    pub channels: Vec<ChannelConfig>,

    /// mTLS material
    pub tls: Option<TlsPaths>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            read_buffer_size: 8 * 1024,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE,
            overflow_policy: OverflowPolicy::default(),
            drain_timeout: Duration::from_secs(5),
            client_identity: String::new(),
            admin_password: None,
            channels: Vec::new(),
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-subscriber queue depth
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the admitted client identity
    pub fn client_identity(mut self, cn: impl Into<String>) -> Self {
        self.client_identity = cn.into();
        self
    }

    /// Set the admin password
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = Some(password.into());
        self
    }

    /// Add a channel
    pub fn channel(mut self, channel: ChannelConfig) -> Self {
        self.channels.push(channel);
        self
    }

    /// Set the TLS material
    pub fn tls(mut self, paths: TlsPaths) -> Self {
        self.tls = Some(paths);
        self
    }

    /// Broadcast hub settings derived from this config
    pub fn hub_config(&self) -> HubConfig {
        HubConfig::default()
            .queue_capacity(self.subscriber_queue_capacity)
            .overflow_policy(self.overflow_policy)
    }

    /// `(name, limit)` pairs for `HistoryStore::new`
    pub fn history_channels(&self) -> impl Iterator<Item = (String, HistoryLimit)> + '_ {
        self.channels
            .iter()
            .map(|c| (c.name.clone(), c.history_limit))
    }

    /// Check the configuration is usable for serving from PEM files
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tls.is_none() {
            return Err(ConfigError::Invalid("tls section is required".into()));
        }
        self.validate_settings()
    }

    /// Check everything except the TLS file paths
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        if self.client_identity.is_empty() {
            return Err(ConfigError::Invalid("client identity (client_cn) must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.name.is_empty() {
                return Err(ConfigError::Invalid("channel name must not be empty".into()));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate channel {}", channel.name)));
            }
        }
        Ok(())
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = file.into_config()?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    channels: Vec<FileChannel>,
    #[serde(default)]
    service: FileService,
    tls: Option<FileTls>,
}

#[derive(Debug, Deserialize)]
struct FileChannel {
    name: String,
    history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FileService {
    host: Option<String>,
    port: Option<u16>,
    admin_password: Option<String>,
    max_connections: Option<usize>,
    queue_capacity: Option<usize>,
    overflow_policy: Option<String>,
    drain_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileTls {
    ca_file: PathBuf,
    cert_file: PathBuf,
    key_file: PathBuf,
    client_cn: String,
}

impl FileConfig {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::default();
        let service = self.service;

        let host: IpAddr = match service.host.as_deref() {
            None | Some("") => IpAddr::from([0, 0, 0, 0]),
            Some(host) => host
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("service.host {:?} is not an IP address", host)))?,
        };
        config.bind_addr = SocketAddr::new(host, service.port.unwrap_or(DEFAULT_PORT));

        if let Some(max) = service.max_connections {
            config = config.max_connections(max);
        }
        if let Some(capacity) = service.queue_capacity {
            config = config.subscriber_queue_capacity(capacity);
        }
        if let Some(name) = service.overflow_policy.as_deref() {
            let policy = OverflowPolicy::from_name(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown overflow_policy {:?}", name)))?;
            config = config.overflow_policy(policy);
        }
        if let Some(secs) = service.drain_timeout_secs {
            config = config.drain_timeout(Duration::from_secs(secs));
        }
        // An empty password is treated as unset
        config.admin_password = service.admin_password.filter(|p| !p.is_empty());

        config.channels = self
            .channels
            .into_iter()
            .map(|c| ChannelConfig::new(c.name).history_limit(HistoryLimit::from(c.history_limit)))
            .collect();

        if let Some(tls) = self.tls {
            config.client_identity = tls.client_cn;
            config.tls = Some(TlsPaths {
                ca_file: tls.ca_file,
                cert_file: tls.cert_file,
                key_file: tls.key_file,
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r##"
[irc]
host = "irc.test.net"
port = 6667
nick = "testbot"

[[channels]]
name = "#test"
history_limit = 50

[[channels]]
name = "#other"

[service]
host = "127.0.0.1"
port = 1234
admin_password = "hunter2"
queue_capacity = 16
overflow_policy = "disconnect"

[tls]
ca_file = "ca.crt"
cert_file = "server.crt"
key_file = "server.key"
client_cn = "client"
"##;

    const TLS_ONLY: &str = r#"
[tls]
ca_file = "ca.crt"
cert_file = "server.crt"
key_file = "server.key"
client_cn = "client_user"
"#;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.subscriber_queue_capacity, DEFAULT_SUBSCRIBER_QUEUE);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert!(config.tcp_nodelay);
        assert!(config.admin_password.is_none());
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:6697".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 6697);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:50052".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(3))
            .drain_timeout(Duration::from_secs(1))
            .subscriber_queue_capacity(0)
            .overflow_policy(OverflowPolicy::Disconnect)
            .client_identity("client_user")
            .admin_password("hunter2")
            .channel(ChannelConfig::new("#rust"))
            .channel(ChannelConfig::new("#tokio").history_limit(HistoryLimit::Limited(10)));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.drain_timeout, Duration::from_secs(1));
        assert_eq!(config.subscriber_queue_capacity, 1);
        assert_eq!(config.client_identity, "client_user");
        assert_eq!(config.admin_password.as_deref(), Some("hunter2"));

        let hub = config.hub_config();
        assert_eq!(hub.queue_capacity, 1);
        assert_eq!(hub.overflow_policy, OverflowPolicy::Disconnect);

        let channels: Vec<_> = config.history_channels().collect();
        assert_eq!(
            channels,
            vec![
                ("#rust".to_string(), HistoryLimit::Default),
                ("#tokio".to_string(), HistoryLimit::Limited(10)),
            ]
        );
    }

    #[test]
    fn test_from_toml_full() {
        let config = ServerConfig::from_toml(FULL).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:1234".parse::<SocketAddr>().unwrap());
        assert_eq!(config.admin_password.as_deref(), Some("hunter2"));
        assert_eq!(config.subscriber_queue_capacity, 16);
        assert_eq!(config.overflow_policy, OverflowPolicy::Disconnect);
        assert_eq!(config.client_identity, "client");
        assert_eq!(
            config.channels,
            vec![
                ChannelConfig::new("#test").history_limit(HistoryLimit::Limited(50)),
                ChannelConfig::new("#other"),
            ]
        );

        let tls = config.tls.unwrap();
        assert_eq!(tls.ca_file, PathBuf::from("ca.crt"));
        assert_eq!(tls.key_file, PathBuf::from("server.key"));
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = ServerConfig::from_toml(TLS_ONLY).unwrap();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
        assert!(config.channels.is_empty());
        assert!(config.admin_password.is_none());
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_zero_history_limit_is_not_default() {
        let text = format!("{}\n[[channels]]\nname = \"#quiet\"\nhistory_limit = 0\n", TLS_ONLY);
        let config = ServerConfig::from_toml(&text).unwrap();

        assert_eq!(config.channels[0].history_limit, HistoryLimit::Limited(0));
    }

    #[test]
    fn test_validation_failures() {
        let missing_tls = "[[channels]]\nname = \"#rust\"\n";
        assert!(matches!(
            ServerConfig::from_toml(missing_tls),
            Err(ConfigError::Invalid(_))
        ));

        let empty_cn = TLS_ONLY.replace("client_user", "");
        assert!(matches!(
            ServerConfig::from_toml(&empty_cn),
            Err(ConfigError::Invalid(_))
        ));

        let duplicate = format!("{}\n[[channels]]\nname = \"#a\"\n[[channels]]\nname = \"#a\"\n", TLS_ONLY);
        assert!(matches!(
            ServerConfig::from_toml(&duplicate),
            Err(ConfigError::Invalid(msg)) if msg.contains("#a")
        ));

        let bad_policy = format!("[service]\noverflow_policy = \"block\"\n{}", TLS_ONLY);
        assert!(matches!(
            ServerConfig::from_toml(&bad_policy),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ServerConfig::from_toml("[[channels]\nname ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].name, "#test");
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            ServerConfig::from_file("/nonexistent/bouncer.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
