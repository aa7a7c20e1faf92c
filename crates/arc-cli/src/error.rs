//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` / `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use arc_config::ConfigError;
use arc_core::{CoreError, FetchError, RunStatus};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// Some devices or operations did not converge.
    pub const PARTIAL: i32 = 9;
    /// Nothing converged, or the desired configuration could not be loaded.
    pub const TOTAL: i32 = 10;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to switch at {url}: {reason}")]
    #[diagnostic(
        code(arc::connection_failed),
        help(
            "Check that the switch is reachable and its REST API is enabled\n\
             (`web-management ssl` and `rest-interface` on the switch).\n\
             URL: {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Switch did not answer within {seconds}s")]
    #[diagnostic(
        code(arc::timeout),
        help("Raise request_timeout in the profile or check switch load.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed for profile '{profile}': {message}")]
    #[diagnostic(
        code(arc::auth_failed),
        help(
            "Verify the username and password.\n\
             Run: arc config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(arc::no_credentials),
        help(
            "Configure credentials with: arc config init\n\
             Or set ARC_USERNAME and ARC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(arc::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: arc config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No desired configuration given")]
    #[diagnostic(
        code(arc::no_desired_config),
        help("Pass --file <path>, or set desired_config in {path}")
    )]
    NoDesiredConfig { path: String },

    #[error("Could not load desired configuration from {path}")]
    #[diagnostic(code(arc::desired_config), help("{reason}"))]
    DesiredConfig { path: String, reason: String },

    #[error("Device '{name}' is not declared in the desired configuration")]
    #[diagnostic(code(arc::unknown_device), help("Declared devices: {declared}"))]
    UnknownDevice { name: String, declared: String },

    #[error(transparent)]
    #[diagnostic(code(arc::config))]
    Config(ConfigError),

    // ── Reconciliation ───────────────────────────────────────────────

    #[error("{failed} of {total} devices did not converge")]
    #[diagnostic(
        code(arc::partial_failure),
        help("See the per-operation report above. Run `arc plan` to inspect what remains.")
    )]
    PartialFailure { failed: usize, total: usize },

    #[error("No device converged")]
    #[diagnostic(
        code(arc::total_failure),
        help("Every device failed before any change was written. Re-run with -v for details.")
    )]
    TotalFailure,

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error: {message}")]
    #[diagnostic(code(arc::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(arc::validation))]
    Validation { field: String, reason: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(arc::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(arc::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::NoDesiredConfig { .. } | Self::DesiredConfig { .. } | Self::TotalFailure => {
                exit_code::TOTAL
            }
            Self::PartialFailure { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::UnknownDevice { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(_) | Self::ApiError { .. } | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }

    /// Error for a finished run that did not fully converge.
    pub fn from_status(status: RunStatus, failed: usize, total: usize) -> Option<Self> {
        match status {
            RunStatus::AllApplied => None,
            RunStatus::Partial => Some(Self::PartialFailure { failed, total }),
            RunStatus::Total => Some(Self::TotalFailure),
        }
    }

    /// Attach the profile name to an authentication error.
    pub fn for_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.into(),
                message,
            },
            Self::NoCredentials { .. } => Self::NoCredentials {
                profile: profile.into(),
            },
            other => other,
        }
    }
}

// ── Library error → CliError mapping ─────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "host".into(),
                reason: message,
            },
            CoreError::Api { message, .. } | CoreError::Internal(message) => {
                CliError::ApiError { message }
            }
        }
    }
}

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        if err.is_auth_failure() {
            CliError::AuthFailed {
                profile: "current".into(),
                message: err.to_string(),
            }
        } else {
            CliError::ApiError {
                message: err.to_string(),
            }
        }
    }
}

impl From<arc_api::Error> for CliError {
    fn from(err: arc_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Connect(e) => e.into(),
            other => CliError::Config(other),
        }
    }
}
