//! Certificate fixtures for tests
//!
//! A throwaway CA that signs server and client leaves on demand.

use std::path::Path;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;

use crate::server::TlsPaths;

/// A leaf certificate and its key
pub struct TestLeaf {
    pub cert_der: CertificateDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
    key_der: Vec<u8>,
}

impl TestLeaf {
    pub fn key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

/// Self-signed test CA
pub struct TestCa {
    pub cert_der: CertificateDer<'static>,
    pub cert_pem: String,
    cert: Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new() -> Self {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "irc-bouncer test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        Self {
            cert_der: cert.der().clone(),
            cert_pem: cert.pem(),
            cert,
            key,
        }
    }

    pub fn root_store(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert_der.clone()).unwrap();
        roots
    }

    fn sign(&self, params: CertificateParams) -> TestLeaf {
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();

        TestLeaf {
            cert_der: cert.der().clone(),
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }

    /// Server certificate valid for `host`
    pub fn server_cert(&self, host: &str) -> TestLeaf {
        let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, host);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.sign(params)
    }

    /// Client certificate with subject CN `cn`
    pub fn client_cert(&self, cn: &str) -> TestLeaf {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        self.sign(params)
    }

    /// Client certificate whose subject has no common name
    pub fn client_cert_without_cn(&self) -> TestLeaf {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::OrganizationName, "no common name");
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        self.sign(params)
    }

    /// Write CA, server cert and key for "localhost" as PEM files under `dir`
    pub fn write_server_files(&self, dir: &Path) -> TlsPaths {
        let server = self.server_cert("localhost");
        let paths = TlsPaths {
            ca_file: dir.join("ca.pem"),
            cert_file: dir.join("server.pem"),
            key_file: dir.join("server.key"),
        };

        std::fs::write(&paths.ca_file, &self.cert_pem).unwrap();
        std::fs::write(&paths.cert_file, &server.cert_pem).unwrap();
        std::fs::write(&paths.key_file, &server.key_pem).unwrap();
        paths
    }

    /// Write a client cert and key for `cn` as PEM files under `dir`
    pub fn write_client_files(&self, dir: &Path, cn: &str) -> TlsPaths {
        let client = self.client_cert(cn);
        let paths = TlsPaths {
            ca_file: dir.join("ca.pem"),
            cert_file: dir.join(format!("{}.pem", cn)),
            key_file: dir.join(format!("{}.key", cn)),
        };

        std::fs::write(&paths.ca_file, &self.cert_pem).unwrap();
        std::fs::write(&paths.cert_file, &client.cert_pem).unwrap();
        std::fs::write(&paths.key_file, &client.key_pem).unwrap();
        paths
    }
}
