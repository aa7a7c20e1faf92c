// ── Session cookie cache ──
//
// One JSON file per profile under the data dir. A cookie is only reused
// for the host and user it was issued to.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use arc_core::{Connected, SwitchConfig};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CachedSession {
    pub host: String,
    pub username: String,
    pub cookie: String,
    pub saved_at: DateTime<Utc>,
}

impl CachedSession {
    fn matches(&self, config: &SwitchConfig) -> bool {
        self.host == config.url.as_str() && self.username == config.username
    }
}

/// Session files rooted at one directory.
#[derive(Debug, Clone)]
pub struct SessionCache {
    dir: PathBuf,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::in_dir(crate::data_dir().join("sessions"))
    }
}

impl SessionCache {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, profile_name: &str) -> PathBuf {
        self.dir.join(format!("{profile_name}.json"))
    }

    pub fn load(&self, profile_name: &str) -> Result<Option<CachedSession>, ConfigError> {
        read_json(&self.path(profile_name))
    }

    pub fn save(&self, profile_name: &str, session: &CachedSession) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(self.path(profile_name), json)?;
        Ok(())
    }

    /// Remove a cached cookie. Missing files are not an error.
    pub fn clear(&self, profile_name: &str) -> Result<(), ConfigError> {
        match std::fs::remove_file(self.path(profile_name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_json(path: &Path) -> Result<Option<CachedSession>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Connect to the switch behind `config`, reusing the cached cookie for
/// `profile_name` and persisting a new one after a fresh login.
///
/// A corrupt cache file is discarded rather than failing the connection.
pub async fn open_session(
    cache: &SessionCache,
    profile_name: &str,
    config: &SwitchConfig,
) -> Result<Connected, ConfigError> {
    let cached = match cache.load(profile_name) {
        Ok(cached) => cached.filter(|c| c.matches(config)),
        Err(e) => {
            warn!(profile = %profile_name, error = %e, "ignoring unreadable session cache");
            None
        }
    };

    let connected = arc_core::connect(config, cached.as_ref().map(|c| c.cookie.as_str())).await?;

    if connected.refreshed {
        let entry = CachedSession {
            host: config.url.to_string(),
            username: config.username.clone(),
            cookie: connected.cookie.clone(),
            saved_at: Utc::now(),
        };
        if let Err(e) = cache.save(profile_name, &entry) {
            warn!(profile = %profile_name, error = %e, "failed to cache session cookie");
        } else {
            debug!(profile = %profile_name, "session cookie cached");
        }
    }

    Ok(connected)
}

/// Log out the cached session for `profile_name`, if any, and forget it.
///
/// The cache entry is removed even when the switch cannot be reached;
/// the switch expires idle sessions on its own.
pub async fn end_session(
    cache: &SessionCache,
    profile_name: &str,
    config: &SwitchConfig,
) -> Result<(), ConfigError> {
    let cached = match cache.load(profile_name) {
        Ok(cached) => cached.filter(|c| c.matches(config)),
        Err(e) => {
            warn!(profile = %profile_name, error = %e, "ignoring unreadable session cache");
            None
        }
    };
    if let Some(cached) = cached {
        if let Err(e) = arc_core::disconnect(config, &cached.cookie).await {
            warn!(profile = %profile_name, error = %e, "logout of cached session failed");
        }
    }
    cache.clear(profile_name)
}
