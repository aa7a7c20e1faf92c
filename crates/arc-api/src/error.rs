use thiserror::Error;

/// Top-level error type for the `arc-api` crate.
///
/// Covers every failure mode of the switch REST surface: session
/// management, transport, HTTP status handling and payload decoding.
/// `arc-core` maps these into engine-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, too many sessions, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The switch no longer accepts the session cookie.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Switch API ──────────────────────────────────────────────────
    /// The switch answered with a non-success status.
    #[error("Switch API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session is gone
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Timeouts, connection failures and 5xx answers (the management
    /// plane reports "busy" as 503) are transient. 429 is treated the same.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            Self::Authentication { .. } | Self::SessionExpired => Some(401),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_server_errors_are_transient() {
        let busy = Error::Api {
            status: 503,
            message: "device busy".into(),
        };
        assert!(busy.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let rejected = Error::Api {
            status: 400,
            message: "invalid vlan".into(),
        };
        assert!(!rejected.is_transient());
        assert!(!Error::SessionExpired.is_transient());
        assert!(Error::SessionExpired.is_auth_expired());
    }

    #[test]
    fn not_found_from_status() {
        let missing = Error::Api {
            status: 404,
            message: String::new(),
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.status(), Some(404));
    }
}
