//! TLS for `adatcps` targets.
//!
//! With a certificate and key pair configured the server certificate is
//! verified against the configured CA and the pair is presented as client
//! certificate. Without a pair the server certificate is accepted as is.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::client::TlsStream;

use crate::config::TlsConfig;
use crate::error::{AdabasError, Result};

fn tls_error(reason: impl Into<String>) -> AdabasError {
    AdabasError::Tls {
        reason: reason.into(),
    }
}

/// Client side TLS connector for ADATCP.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    verified: bool,
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("verified", &self.verified)
            .finish()
    }
}

impl TlsConnector {
    /// Builds the connector, reading certificate files from disk.
    pub fn new(config: &TlsConfig) -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let (cert_file, key_file) = match (&config.cert_file, &config.key_file) {
            (Some(cert), Some(key)) => (cert, key),
            _ => return Ok(Self::unverified()),
        };
        let certs = load_certs_from_pem(&read_file(cert_file)?)?;
        let key = load_private_key_from_pem(&read_file(key_file)?)?;
        let ca_pem = read_file(config.ca_file.as_ref().unwrap_or(cert_file))?;
        Self::with_pair(&ca_pem, certs, key)
    }

    /// Verifying connector presenting `certs` and `key` to the server.
    pub fn with_pair(
        ca_pem: &[u8],
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in load_certs_from_pem(ca_pem)? {
            root_store
                .add(cert)
                .map_err(|e| tls_error(format!("failed to add CA cert: {}", e)))?;
        }
        let client_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_client_auth_cert(certs, key)
            .map_err(|e| tls_error(format!("failed to create client config: {}", e)))?;
        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(client_config)),
            verified: true,
        })
    }

    /// Connector that accepts any server certificate.
    pub fn unverified() -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let client_config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth();
        Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(client_config)),
            verified: false,
        }
    }

    /// Whether the server certificate is checked.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Runs the TLS handshake over `stream`.
    pub async fn connect<IO>(&self, domain: &str, stream: IO) -> Result<TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let domain = if let Ok(ip) = domain.parse::<std::net::IpAddr>() {
            ServerName::IpAddress(ip.into())
        } else {
            ServerName::try_from(domain.to_string())
                .map_err(|e| tls_error(format!("invalid domain: {}", e)))?
        };
        self.inner
            .connect(domain, stream)
            .await
            .map_err(|e| tls_error(format!("TLS handshake failed: {}", e)))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| tls_error(format!("cannot read {}: {}", path.display(), e)))
}

/// Loads certificates from PEM-encoded data.
pub fn load_certs_from_pem(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut certs = Vec::new();
    let mut cursor = std::io::Cursor::new(pem);
    while let Ok(Some(item)) = rustls_pemfile::read_one(&mut cursor) {
        if let rustls_pemfile::Item::X509Certificate(cert) = item {
            certs.push(cert);
        }
    }
    if certs.is_empty() {
        return Err(tls_error("no certificates found in PEM"));
    }
    Ok(certs)
}

/// Loads the first private key (PKCS#8, PKCS#1 or SEC1) from PEM-encoded data.
pub fn load_private_key_from_pem(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem);
    while let Ok(Some(item)) = rustls_pemfile::read_one(&mut cursor) {
        match item {
            rustls_pemfile::Item::Pkcs8Key(key) => return Ok(PrivateKeyDer::Pkcs8(key)),
            rustls_pemfile::Item::Pkcs1Key(key) => return Ok(PrivateKeyDer::Pkcs1(key)),
            rustls_pemfile::Item::Sec1Key(key) => return Ok(PrivateKeyDer::Sec1(key)),
            _ => {}
        }
    }
    Err(tls_error("no private key found in PEM"))
}

/// Skips certificate validation but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Throwaway certificates for TLS tests.

    use super::*;

    /// Self-signed CA as PEM pair plus the rcgen handles for signing leaves.
    pub fn generate_ca() -> (Vec<u8>, Vec<u8>, rcgen::Certificate, rcgen::KeyPair) {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        (
            cert.pem().into_bytes(),
            key.serialize_pem().into_bytes(),
            cert,
            key,
        )
    }

    /// Leaf certificate for `name` signed by the CA: (certificate PEM, key PEM).
    pub fn generate_leaf(
        name: &str,
        ca: &rcgen::Certificate,
        ca_key: &rcgen::KeyPair,
    ) -> (Vec<u8>, Vec<u8>) {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
        let cert = params.signed_by(&key, ca, ca_key).unwrap();
        (cert.pem().into_bytes(), key.serialize_pem().into_bytes())
    }

    /// Server side acceptor presenting the given pair.
    pub fn acceptor(cert_pem: &[u8], key_pem: &[u8]) -> tokio_rustls::TlsAcceptor {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let certs = load_certs_from_pem(cert_pem).unwrap();
        let key = load_private_key_from_pem(key_pem).unwrap();
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .unwrap();
        tokio_rustls::TlsAcceptor::from(Arc::new(config))
    }
}
