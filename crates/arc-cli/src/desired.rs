//! Desired-configuration loading.
//!
//! `.toml` files are read as TOML, everything else as YAML (which also
//! accepts JSON).

use std::path::{Path, PathBuf};

use arc_config::Config;
use arc_core::{ConfigSnapshot, RawDesiredConfig, ValidationError, parse_config};

use crate::error::CliError;

/// Pick the file from `--file`, falling back to `desired_config`.
pub fn resolve_path(file: Option<&Path>, cfg: &Config, config_path: &Path) -> Result<PathBuf, CliError> {
    file.map(Path::to_path_buf)
        .or_else(|| cfg.desired_config.clone())
        .ok_or_else(|| CliError::NoDesiredConfig {
            path: config_path.display().to_string(),
        })
}

pub fn load(path: &Path) -> Result<RawDesiredConfig, CliError> {
    let fail = |reason: String| CliError::DesiredConfig {
        path: path.display().to_string(),
        reason,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let raw: RawDesiredConfig = if is_toml {
        toml::from_str(&contents).map_err(|e| fail(e.to_string()))?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| fail(e.to_string()))?
    };

    if raw.devices.is_empty() {
        return Err(fail("no devices declared".into()));
    }
    tracing::debug!(path = %path.display(), devices = raw.devices.len(), "desired configuration loaded");
    Ok(raw)
}

/// Validate every declared device, keeping only `selected` when non-empty.
pub fn select(
    raw: &RawDesiredConfig,
    selected: &[String],
) -> Result<Vec<(String, Result<ConfigSnapshot, ValidationError>)>, CliError> {
    if let Some(unknown) = selected.iter().find(|name| !raw.devices.contains_key(*name)) {
        return Err(CliError::UnknownDevice {
            name: unknown.clone(),
            declared: raw.devices.keys().cloned().collect::<Vec<_>>().join(", "),
        });
    }

    let mut devices = parse_config(raw);
    if !selected.is_empty() {
        devices.retain(|(name, _)| selected.contains(name));
    }
    Ok(devices)
}
