// ── Core error types ──
//
// Engine-level errors. Nothing here exposes raw HTTP details: the
// `From<arc_api::Error>` impls translate transport failures into
// connection errors (`CoreError`) or per-request device outcomes
// (`DeviceError`). Every error that can end a device's run is attributed
// to that device.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::EntityKey;

// ── CoreError ───────────────────────────────────────────────────────

/// Errors establishing a session with a switch.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to switch at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Switch connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<arc_api::Error> for CoreError {
    fn from(err: arc_api::Error) -> Self {
        match err {
            arc_api::Error::Authentication { message } => CoreError::AuthenticationFailed { message },
            arc_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            arc_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            arc_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            arc_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            arc_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            arc_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

// ── DeviceError ─────────────────────────────────────────────────────

/// Outcome of one failed request against a device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The session is not (or no longer) valid. Never retried.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// Timeout, connection failure, busy device. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The device refused the request.
    #[error("rejected by device: {0}")]
    Rejected(String),

    /// The device does not implement the requested capability.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The device answered with something we could not interpret.
    #[error("malformed device response: {0}")]
    Protocol(String),
}

impl DeviceError {
    /// Whether retrying the same request may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<arc_api::Error> for DeviceError {
    fn from(err: arc_api::Error) -> Self {
        if err.is_auth_expired() {
            Self::NotAuthenticated(err.to_string())
        } else if err.is_transient() {
            Self::Transient(err.to_string())
        } else if matches!(err, arc_api::Error::Deserialization { .. }) {
            Self::Protocol(err.to_string())
        } else {
            Self::Rejected(err.to_string())
        }
    }
}

// ── ValidationError ─────────────────────────────────────────────────

/// One violated declaration rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// `kind:id` of the offending entity, or its position in the file
    /// when no identity could be established.
    pub entity: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

/// Every rule a declared (or fetched) configuration violates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub device: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} configuration problem(s) for device '{}'",
            self.violations.len(),
            self.device
        )?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ── FetchError ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching live state from '{device}' failed after {attempts} attempt(s): {source}")]
    Device {
        device: String,
        attempts: u32,
        source: DeviceError,
    },

    #[error("live state reported by '{device}' is inconsistent: {source}")]
    Inconsistent {
        device: String,
        source: ValidationError,
    },

    #[error("fetch from '{device}' cancelled")]
    Cancelled { device: String },
}

impl FetchError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Device {
                source: DeviceError::NotAuthenticated(_),
                ..
            }
        )
    }
}

// ── OrderError ──────────────────────────────────────────────────────

/// A delete that would strand entities still referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteViolation {
    pub deleted: EntityKey,
    pub dependents: Vec<EntityKey>,
}

impl fmt::Display for DeleteViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is still referenced by {}", self.deleted, join_keys(&self.dependents))
    }
}

/// An entity the change set needs that neither exists on the device nor
/// is created by the change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub missing: EntityKey,
    pub dependents: Vec<EntityKey>,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (needed by {})", self.missing, join_keys(&self.dependents))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("dependency cycle between {}", join_keys(.entities))]
    DependencyCycle { entities: Vec<EntityKey> },

    #[error("unsafe delete: {}", join_violations(.violations))]
    DependencyViolation { violations: Vec<DeleteViolation> },

    #[error(
        "missing dependency: {} does not exist on the device and is not created",
        join_display(.missing)
    )]
    UnresolvedDependency { missing: Vec<MissingDependency> },
}

fn join_keys(keys: &[EntityKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn join_violations(violations: &[DeleteViolation]) -> String {
    join_display(violations)
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// ── ReconcileError ──────────────────────────────────────────────────

/// Why a device's run ended before any write was attempted.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Connect(#[from] CoreError),

    #[error("reconciliation cancelled before any change was applied")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Pipeline stage a [`ReconcileError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Connect,
    Validate,
    Fetch,
    Order,
    Apply,
}

impl ReconcileError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Connect(_) => Stage::Connect,
            Self::Validation(_) => Stage::Validate,
            Self::Fetch(_) => Stage::Fetch,
            Self::Order(_) => Stage::Order,
            Self::Cancelled | Self::Internal(_) => Stage::Apply,
        }
    }
}
