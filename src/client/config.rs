//! Client configuration

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::auth::tls;
use crate::error::ConfigError;

/// Client-side mTLS material
#[derive(Debug)]
pub struct ClientTlsConfig {
    ca_certs: Vec<CertificateDer<'static>>,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientTlsConfig {
    /// Load CA, client certificate and key from PEM files
    pub fn from_pem_files(
        ca_file: impl AsRef<Path>,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ca_certs: tls::load_certs(ca_file.as_ref())?,
            cert_chain: tls::load_certs(cert_file.as_ref())?,
            key: tls::load_private_key(key_file.as_ref())?,
        })
    }

    /// Use in-memory DER material
    pub fn from_der(
        ca_certs: Vec<CertificateDer<'static>>,
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Self {
        Self {
            ca_certs,
            cert_chain,
            key,
        }
    }

    pub(crate) fn rustls_config(&self) -> Result<Arc<rustls::ClientConfig>, ConfigError> {
        tls::client_config(
            self.ca_certs.clone(),
            self.cert_chain.clone(),
            self.key.clone_key(),
        )
    }
}

impl Clone for ClientTlsConfig {
    fn clone(&self) -> Self {
        Self {
            ca_certs: self.ca_certs.clone(),
            cert_chain: self.cert_chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bouncer address (`host:port`)
    pub addr: String,

    /// Name checked against the server certificate
    pub server_name: String,

    /// TCP connect plus TLS handshake deadline
    pub connect_timeout: Duration,

    /// mTLS material
    pub tls: ClientTlsConfig,
}

impl ClientConfig {
    /// Create a new client config for `addr`
    pub fn new(addr: impl Into<String>, tls: ClientTlsConfig) -> Self {
        Self {
            addr: addr.into(),
            server_name: "localhost".to_string(),
            connect_timeout: Duration::from_secs(10),
            tls,
        }
    }

    /// Set the expected server certificate name
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
