//! rustls client certificate verifier enforcing the identity gate

use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, OtherError, SignatureScheme};

use super::IdentityGate;
use crate::error::AuthError;

/// Chain verification followed by the identity gate
///
/// Wraps a WebPKI verifier; only a chain it accepts is handed to the gate.
/// A gate rejection carries the `AuthError` inside
/// `CertificateError::Other` so the listener can recover it.
#[derive(Debug)]
pub struct IdentityVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    gate: IdentityGate,
}

impl IdentityVerifier {
    pub fn new(inner: Arc<dyn ClientCertVerifier>, gate: IdentityGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }
}

impl ClientCertVerifier for IdentityVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        self.inner
            .verify_client_cert(end_entity, intermediates, now)?;

        match self.gate.check(end_entity) {
            Ok(identity) => {
                tracing::debug!(identity = %identity, "Client identity accepted");
                Ok(ClientCertVerified::assertion())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Client rejected by identity gate");
                Err(rustls::Error::InvalidCertificate(CertificateError::Other(
                    OtherError(Arc::new(e)),
                )))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Recover the gate's verdict from a failed handshake error
///
/// tokio-rustls surfaces handshake failures as `io::Error` wrapping the
/// `rustls::Error`.
pub fn auth_error_from_handshake(err: &std::io::Error) -> Option<AuthError> {
    let tls = err.get_ref()?.downcast_ref::<rustls::Error>()?;
    match tls {
        rustls::Error::InvalidCertificate(CertificateError::Other(other)) => {
            other.0.downcast_ref::<AuthError>().cloned()
        }
        rustls::Error::NoCertificatesPresented => Some(AuthError::MissingCertificate),
        _ => None,
    }
}
