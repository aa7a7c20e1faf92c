//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::PathBuf;

use arc_config::{Config, SessionCache};
use arc_core::{
    ArubaSwitch, Connected, CoreError, EntityKind, ReconcileError, SwitchConfig, TlsVerification,
};

use crate::cli::{GlobalOpts, KindArg};
use crate::error::CliError;

/// Config file in effect: `--config` / `ARC_CONFIG`, else the platform path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(arc_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(arc_config::load_config_from(&config_path(global))?)
}

pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn profile_not_found(name: &str, cfg: &Config) -> CliError {
    let available: Vec<_> = cfg.profiles.keys().cloned().collect();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Translate a named profile plus global flags into a `SwitchConfig`.
pub fn switch_config(cfg: &Config, name: &str, global: &GlobalOpts) -> Result<SwitchConfig, CliError> {
    let profile = cfg.profiles.get(name).ok_or_else(|| profile_not_found(name, cfg))?;
    let mut switch = arc_config::profile_to_switch_config(profile, name, &cfg.defaults)
        .map_err(|e| CliError::from(e).for_profile(name))?;
    if global.insecure {
        switch.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok(switch)
}

/// Open an authenticated session for a switch, reusing its cached cookie.
pub async fn connect(switch: &SwitchConfig) -> Result<Connected, CliError> {
    arc_config::open_session(&SessionCache::default(), &switch.name, switch)
        .await
        .map_err(|e| CliError::from(e).for_profile(&switch.name))
}

/// Connect the switch behind a profile for a multi-device run. Failures
/// are attributed to that device instead of ending the invocation.
pub async fn open_device(cfg: &Config, name: &str, global: &GlobalOpts) -> Result<ArubaSwitch, ReconcileError> {
    let switch = switch_config(cfg, name, global).map_err(|e| {
        ReconcileError::Connect(CoreError::Config {
            message: e.to_string(),
        })
    })?;
    match arc_config::open_session(&SessionCache::default(), name, &switch).await {
        Ok(connected) => Ok(ArubaSwitch::new(name, connected.session)),
        Err(arc_config::ConfigError::Connect(e)) => Err(ReconcileError::Connect(e)),
        Err(other) => Err(ReconcileError::Connect(CoreError::Config {
            message: other.to_string(),
        })),
    }
}

/// Managed kinds from `--kind` flags; every kind when none are given.
pub fn kinds(args: &[KindArg]) -> Vec<EntityKind> {
    if args.is_empty() {
        return EntityKind::all();
    }
    let mut kinds: Vec<EntityKind> = args
        .iter()
        .map(|k| match k {
            KindArg::Vlan => EntityKind::Vlan,
            KindArg::Interface => EntityKind::Interface,
            KindArg::Acl => EntityKind::Acl,
            KindArg::AclRule => EntityKind::AclRule,
            KindArg::StaticRoute => EntityKind::StaticRoute,
        })
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
