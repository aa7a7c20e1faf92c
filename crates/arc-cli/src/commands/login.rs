//! `login`: log out any cached session, authenticate again and cache the
//! new session cookie.

use arc_config::SessionCache;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = util::load_config(global)?;
    let name = args
        .profile
        .unwrap_or_else(|| util::active_profile_name(global, &cfg));

    if let Some(host) = args.host {
        arc_config::switch_url(&host)?;
        let profile = cfg.profiles.entry(name.clone()).or_default();
        profile.host = host;
        profile.username = Some(args.username);

        if profile.password_env.is_none() && std::env::var("ARC_PASSWORD").is_err() {
            let password = rpassword::prompt_password(format!("Password for profile '{name}': "))
                .map_err(util::prompt_err)?;
            arc_config::store_password(&name, &password)?;
        }
        if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
            cfg.default_profile = Some(name.clone());
        }
        arc_config::save_config_to(&cfg, &util::config_path(global))?;
    }

    let switch = util::switch_config(&cfg, &name, global)?;
    arc_config::end_session(&SessionCache::default(), &name, &switch).await?;
    let connected = util::connect(&switch).await?;
    tracing::debug!(profile = %name, refreshed = connected.refreshed, "login complete");

    if !global.quiet {
        eprintln!("✓ Logged in to '{name}' ({})", switch.url);
    }
    Ok(())
}
