// HTTP transport for the switch REST API.
//
// Every `Session` builds its `reqwest::Client` here, whether it starts with
// a login or resumes a cached cookie. The cookie jar is what carries the
// switch's `sessionId` across requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Certificate, ClientBuilder};

use crate::error::Error;

/// How the switch's HTTPS certificate is checked.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Platform trust store.
    System,
    /// Trust the CA in this PEM file (in addition to the platform store).
    CustomCa(PathBuf),
    /// No verification. ArubaOS ships a self-signed certificate.
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// One request, start to last byte.
    pub request_timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            cookie_jar: None,
        }
    }
}

fn load_ca(path: &Path) -> Result<Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {e}", path.display())))?;
    Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))
}

impl TransportConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let builder = self.configure_tls(
            ClientBuilder::new()
                .user_agent(concat!("arc/", env!("CARGO_PKG_VERSION")))
                .connect_timeout(self.connect_timeout)
                .timeout(self.request_timeout),
        )?;

        let builder = match &self.cookie_jar {
            Some(jar) => builder.cookie_provider(Arc::clone(jar)),
            None => builder,
        };

        builder
            .build()
            .map_err(|e| Error::Tls(format!("HTTP client setup failed: {e}")))
    }

    fn configure_tls(&self, builder: ClientBuilder) -> Result<ClientBuilder, Error> {
        Ok(match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        })
    }

    /// Same settings with an empty cookie jar; used for every new session.
    #[must_use]
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }
}
