//! TLS material loading and rustls configuration
//!
//! Both sides use the ring provider explicitly, so nothing depends on a
//! process-wide default provider being installed.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use super::{IdentityGate, IdentityVerifier};
use crate::error::ConfigError;

/// The crypto provider used for every TLS config built by this crate
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Read a PEM file into memory
pub fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse every certificate in a PEM buffer
pub fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::Tls(format!("invalid certificate PEM: {}", e)))?;

    if certs.is_empty() {
        return Err(ConfigError::Tls("no certificates found in PEM".into()));
    }
    Ok(certs)
}

/// Parse the first private key in a PEM buffer
pub fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ConfigError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| ConfigError::Tls(format!("invalid private key PEM: {}", e)))?
        .ok_or_else(|| ConfigError::Tls("no private key found in PEM".into()))
}

/// Load certificates from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    parse_certs(&read_pem(path)?)
        .map_err(|e| ConfigError::Tls(format!("{}: {}", path.display(), e)))
}

/// Load a private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    parse_private_key(&read_pem(path)?)
        .map_err(|e| ConfigError::Tls(format!("{}: {}", path.display(), e)))
}

fn root_store(ca_certs: Vec<CertificateDer<'static>>) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| ConfigError::Tls(format!("invalid CA certificate: {}", e)))?;
    }
    Ok(roots)
}

/// Build the server-side rustls config
///
/// Clients must present a certificate chaining to `ca_certs` whose leaf CN
/// passes `gate`.
pub fn server_config(
    ca_certs: Vec<CertificateDer<'static>>,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    gate: IdentityGate,
) -> Result<Arc<rustls::ServerConfig>, ConfigError> {
    let provider = crypto_provider();
    let roots = root_store(ca_certs)?;

    let inner = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(|e| ConfigError::Tls(format!("client verifier: {}", e)))?;
    let verifier = Arc::new(IdentityVerifier::new(inner, gate));

    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .map_err(|e| ConfigError::Tls(format!("server certificate: {}", e)))?;

    Ok(Arc::new(config))
}

/// Build the client-side rustls config used by `BouncerClient`
pub fn client_config(
    ca_certs: Vec<CertificateDer<'static>>,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<rustls::ClientConfig>, ConfigError> {
    let roots = root_store(ca_certs)?;

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| ConfigError::Tls(format!("client certificate: {}", e)))?;

    Ok(Arc::new(config))
}
