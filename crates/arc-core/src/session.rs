// ── Session establishment ──
//
// Resume a cached session cookie when one is available, fall back to a
// fresh login when the switch no longer accepts it. Callers persist the
// cookie returned in `Connected::cookie` when it changed.

use arc_api::Session;
use tracing::{debug, info};

use crate::config::SwitchConfig;
use crate::error::CoreError;

/// An authenticated session plus the cookie that authenticates it.
#[derive(Debug)]
pub struct Connected {
    pub session: Session,
    pub cookie: String,
    /// A new login happened; the caller's cached cookie is stale.
    pub refreshed: bool,
}

/// Open an authenticated session to the switch in `config`.
///
/// A cached cookie is verified with one cheap request. If the switch
/// rejects it, the session logs in again, once.
pub async fn connect(config: &SwitchConfig, cached_cookie: Option<&str>) -> Result<Connected, CoreError> {
    let session = Session::new(config.url.clone(), &config.transport())?;

    if let Some(cookie) = cached_cookie {
        session.resume(cookie);
        match session.verify().await {
            Ok(()) => {
                debug!(switch = %config.name, "resumed cached session");
                return Ok(Connected {
                    session,
                    cookie: cookie.to_owned(),
                    refreshed: false,
                });
            }
            Err(e) if e.is_auth_expired() => {
                info!(switch = %config.name, "cached session rejected, logging in again");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let cookie = session.login(&config.username, &config.password).await?;
    debug!(switch = %config.name, "logged in");
    Ok(Connected {
        session,
        cookie,
        refreshed: true,
    })
}

/// Log out the session behind `cookie`. A session the switch has
/// already dropped counts as ended.
pub async fn disconnect(config: &SwitchConfig, cookie: &str) -> Result<(), CoreError> {
    let session = Session::new(config.url.clone(), &config.transport())?;
    session.resume(cookie);
    match session.logout().await {
        Ok(()) => {
            debug!(switch = %config.name, "logged out");
            Ok(())
        }
        Err(e) if e.is_auth_expired() => {
            debug!(switch = %config.name, "session already expired");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
