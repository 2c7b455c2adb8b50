//! Client identity gate
//!
//! Every downstream client presents a certificate signed by the configured
//! CA. After normal chain verification, the leaf's subject common name must
//! equal the single configured client identity, byte for byte. The check runs
//! inside the TLS handshake, so a rejected client never gets to send a frame.

pub mod tls;
pub mod verifier;

#[cfg(test)]
pub mod test_utils;

pub use verifier::IdentityVerifier;

use rustls::pki_types::CertificateDer;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::AuthError;

/// A client identity that passed the gate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wrap a name that was verified by other means
    pub(crate) fn assume_verified(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Predicate admitting exactly one certificate common name
#[derive(Debug, Clone)]
pub struct IdentityGate {
    expected: String,
}

impl IdentityGate {
    /// Create a gate that admits only `expected`
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// The identity this gate admits
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Check a leaf certificate
    pub fn check(&self, leaf: &CertificateDer<'_>) -> Result<ClientIdentity, AuthError> {
        let presented = common_name(leaf)?;
        if presented != self.expected {
            return Err(AuthError::IdentityMismatch {
                expected: self.expected.clone(),
                presented,
            });
        }
        Ok(ClientIdentity(presented))
    }

    /// Check the peer chain of an established connection (leaf first)
    pub fn check_chain(
        &self,
        chain: Option<&[CertificateDer<'_>]>,
    ) -> Result<ClientIdentity, AuthError> {
        let leaf = chain
            .and_then(|certs| certs.first())
            .ok_or(AuthError::MissingCertificate)?;
        self.check(leaf)
    }
}

/// Extract the first subject common name of a DER certificate
pub fn common_name(cert: &CertificateDer<'_>) -> Result<String, AuthError> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref())
        .map_err(|e| AuthError::MalformedCertificate(e.to_string()))?;

    let attr = parsed
        .subject()
        .iter_common_name()
        .next()
        .ok_or(AuthError::MissingCommonName)?;

    attr.as_str()
        .map(str::to_owned)
        .map_err(|e| AuthError::MalformedCertificate(e.to_string()))
}
