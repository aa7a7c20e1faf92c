//! Shared configuration for the arc CLI.
//!
//! TOML profiles (one per switch), credential resolution (env + keyring +
//! plaintext), the session cookie cache, and translation to
//! `arc_core::SwitchConfig`.

mod session;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arc_core::{CoreError, RetryPolicy, SwitchConfig, TlsVerification};

pub use session::{CachedSession, SessionCache, end_session, open_session};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "arc";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("session cache is corrupt: {0}")]
    SessionCache(#[from] serde_json::Error),

    #[error(transparent)]
    Connect(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when a command names no switch.
    pub default_profile: Option<String>,

    /// Desired-configuration file used when `--file` is not given.
    pub desired_config: Option<PathBuf>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named switch profiles. The profile name is the device name used in
    /// the desired-configuration file.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            desired_config: None,
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.into(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Seconds allowed for the TCP + TLS handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Seconds allowed for each request round trip.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Retries of one fetch or one operation.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Compensate applied operations after a failure.
    #[serde(default = "default_rollback")]
    pub rollback: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            retry_budget: default_retry_budget(),
            rollback: default_rollback(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}
fn default_retry_budget() -> u32 {
    3
}
fn default_rollback() -> bool {
    true
}

/// A named switch profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Switch base URL or bare address (e.g. "https://10.0.0.2" or "10.0.0.2").
    pub host: String,

    /// Management user. Aruba's factory account is `manager`.
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override handshake timeout (seconds).
    pub connect_timeout: Option<u64>,

    /// Override request timeout (seconds).
    pub request_timeout: Option<u64>,

    /// Override retry budget.
    pub retry_budget: Option<u32>,

    /// Override rollback behaviour.
    pub rollback: Option<bool>,
}

impl Profile {
    pub fn retry_policy(&self, defaults: &Defaults) -> RetryPolicy {
        RetryPolicy::default().with_budget(self.retry_budget.unwrap_or(defaults.retry_budget))
    }

    pub fn rollback(&self, defaults: &Defaults) -> bool {
        self.rollback.unwrap_or(defaults.rollback)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "arc", "arc")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding cached session cookies.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("arc");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under `ARC_*`
/// environment variables (`ARC_DEFAULTS__RETRY_BUDGET=5`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ARC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Resolve credentials: username from the profile (or `ARC_USERNAME`),
/// password from the profile's env var, `ARC_PASSWORD`, the keyring, then
/// plaintext config.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("ARC_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 2. Global env var
    if let Ok(pw) = std::env::var("ARC_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 3. Keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Parse a profile's `host` into a switch URL; bare addresses get `https://`.
pub fn switch_url(host: &str) -> Result<url::Url, ConfigError> {
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    };
    candidate.parse().map_err(|_| ConfigError::Validation {
        field: "host".into(),
        reason: format!("invalid URL: {host}"),
    })
}

/// Build a `SwitchConfig` from a profile.
pub fn profile_to_switch_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SwitchConfig, ConfigError> {
    let url = switch_url(&profile.host)?;
    let (username, password) = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::DangerAcceptInvalid // switches ship self-signed certificates
    };

    Ok(SwitchConfig {
        name: profile_name.into(),
        url,
        username,
        password,
        tls,
        connect_timeout: Duration::from_secs(
            profile.connect_timeout.unwrap_or(defaults.connect_timeout),
        ),
        request_timeout: Duration::from_secs(
            profile.request_timeout.unwrap_or(defaults.request_timeout),
        ),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "core-1"

[defaults]
retry_budget = 5

[profiles.core-1]
host = "10.0.0.2"
username = "manager"
password = "s3cret"
rollback = false
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("core-1"));
        assert_eq!(cfg.defaults.retry_budget, 5);
        assert_eq!(cfg.defaults.request_timeout, 30);

        let profile = cfg.profile("core-1").unwrap();
        assert!(!profile.rollback(&cfg.defaults));
        assert_eq!(profile.retry_policy(&cfg.defaults).retry_budget, 5);
        assert!(matches!(
            cfg.profile("nope"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "edge".into(),
            Profile {
                host: "https://10.0.0.9".into(),
                username: Some("manager".into()),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("edge").unwrap().host, "https://10.0.0.9");
    }

    #[test]
    fn bare_host_gets_https() {
        assert_eq!(switch_url("10.0.0.2").unwrap().as_str(), "https://10.0.0.2/");
        assert_eq!(switch_url("http://sw1:8080").unwrap().as_str(), "http://sw1:8080/");
    }

    #[test]
    fn profile_becomes_switch_config() {
        let profile = Profile {
            host: "10.0.0.2".into(),
            username: Some("manager".into()),
            password: Some("plain".into()),
            ca_cert: Some("/etc/arc/ca.pem".into()),
            request_timeout: Some(5),
            ..Profile::default()
        };

        let cfg = profile_to_switch_config(&profile, "profile-under-test", &Defaults::default()).unwrap();
        assert_eq!(cfg.name, "profile-under-test");
        assert_eq!(cfg.tls, TlsVerification::CustomCa("/etc/arc/ca.pem".into()));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.password.expose_secret(), "plain");
    }
}
