// ── Runtime connection configuration ──
//
// These types describe *how* to reach one switch. They carry credentials
// and connection tuning but never touch disk: the CLI builds a
// `SwitchConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use arc_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Switches ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single switch.
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Device name used in reports (the profile name).
    pub name: String,
    /// Switch URL, e.g. `https://10.0.0.2`.
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Bounds the TCP + TLS handshake.
    pub connect_timeout: Duration,
    /// Bounds each request round trip.
    pub request_timeout: Duration,
}

impl SwitchConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            cookie_jar: None,
        }
    }
}
