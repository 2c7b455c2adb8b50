//! Error types for the bouncer
//!
//! Errors are scoped to the session (or listener) that produced them. A
//! failing session is torn down on its own; nothing here is fatal to the
//! broadcast hub or the ingress path.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Transport I/O failure (read, write or accept)
    Io(io::Error),
    /// TLS layer failure other than an identity rejection
    Tls(rustls::Error),
    /// Peer violated the stream protocol
    Protocol(ProtocolError),
    /// Peer certificate did not pass the identity gate
    Unauthorized(AuthError),
    /// Configuration could not be loaded or is invalid
    Config(ConfigError),
    /// An operation did not complete within its deadline
    Timeout(&'static str),
}

impl Error {
    /// Whether this error is a transport-level failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Tls(_) | Error::Timeout(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "transport failure: {}", e),
            Error::Tls(e) => write!(f, "tls error: {}", e),
            Error::Protocol(e) => write!(f, "protocol violation: {}", e),
            Error::Unauthorized(e) => write!(f, "unauthorized: {}", e),
            Error::Config(e) => write!(f, "configuration error: {}", e),
            Error::Timeout(what) => write!(f, "timed out: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Tls(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Unauthorized(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Timeout(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Unauthorized(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Wire protocol violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame kind byte is not one we know
    UnknownFrameKind(u8),
    /// Declared frame length exceeds the configured maximum
    FrameTooLarge { size: usize, max: usize },
    /// Frame ended before the named field was complete
    Truncated(&'static str),
    /// A string field was not valid UTF-8
    InvalidUtf8(&'static str),
    /// Bytes left over after decoding a complete frame body
    TrailingBytes(usize),
    /// Timestamp does not fit the platform clock
    InvalidTimestamp(u64),
    /// First frame on a stream was not a Subscribe request
    InvalidFirstMessage(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownFrameKind(kind) => {
                write!(f, "unknown frame kind 0x{:02x}", kind)
            }
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "frame of {} bytes exceeds maximum {}", size, max)
            }
            ProtocolError::Truncated(field) => write!(f, "frame truncated in {}", field),
            ProtocolError::InvalidUtf8(field) => write!(f, "invalid utf-8 in {}", field),
            ProtocolError::TrailingBytes(n) => write!(f, "{} trailing bytes after frame body", n),
            ProtocolError::InvalidTimestamp(micros) => {
                write!(f, "timestamp {}us is out of range", micros)
            }
            ProtocolError::InvalidFirstMessage(got) => {
                write!(f, "first message must be Subscribe, got {}", got)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Identity gate rejections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Connection completed without a client certificate
    MissingCertificate,
    /// Leaf certificate could not be parsed
    MalformedCertificate(String),
    /// Leaf certificate subject carries no common name
    MissingCommonName,
    /// Common name differs from the configured identity
    IdentityMismatch { expected: String, presented: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCertificate => write!(f, "no client certificate presented"),
            AuthError::MalformedCertificate(e) => write!(f, "malformed client certificate: {}", e),
            AuthError::MissingCommonName => write!(f, "client certificate has no common name"),
            AuthError::IdentityMismatch { expected, presented } => write!(
                f,
                "client CN {:?} does not match expected {:?}",
                presented, expected
            ),
        }
    }
}

impl std::error::Error for AuthError {}

/// Configuration loading and validation failures
#[derive(Debug)]
pub enum ConfigError {
    /// A file referenced by the configuration could not be read
    Read { path: PathBuf, source: io::Error },
    /// The configuration text is not valid TOML for our schema
    Parse(String),
    /// The configuration parsed but is semantically invalid
    Invalid(String),
    /// Certificate or key material is unusable
    Tls(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "invalid config: {}", e),
            ConfigError::Tls(e) => write!(f, "tls material: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
