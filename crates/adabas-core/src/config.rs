//! Client configuration.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AdabasError, Result};

/// Default cap on a single reply payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// TCP socket settings for ADATCP connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Connect timeout in milliseconds (default: 5000).
    pub connect_timeout_ms: u64,
    /// Disable Nagle's algorithm (default: true).
    pub nodelay: bool,
    /// Largest reply payload accepted from a server, in bytes (default: 64 MiB).
    pub max_payload_bytes: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            nodelay: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// TLS settings for `adatcps` targets.
///
/// Without a certificate and key pair the server certificate is not
/// verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM certificate chain presented to the server.
    pub cert_file: Option<PathBuf>,
    /// PEM private key matching `cert_file`.
    pub key_file: Option<PathBuf>,
    /// PEM CA bundle used to verify the server; falls back to `cert_file`.
    pub ca_file: Option<PathBuf>,
    /// Name checked against the server certificate; defaults to the URL host.
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// Whether a certificate and key pair is configured.
    pub fn has_key_pair(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// Record buffer growth on "record buffer too short".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of grow-and-retry cycles (default: 5).
    pub max_retries: u32,
    /// Bytes added to every record buffer per retry (default: 8192).
    pub grow_step: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            grow_step: 8192,
        }
    }
}

/// Everything a client needs besides the target URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Socket settings.
    pub tcp: TcpConfig,
    /// TLS settings for `adatcps`.
    pub tls: TlsConfig,
    /// Record buffer growth.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Parses a JSON document; missing sections keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AdabasError::Config {
            reason: e.to_string(),
        })
    }
}
