// Session authentication
//
// Cookie-based login/logout against `login-sessions`. The login endpoint
// returns a `sessionId=...` cookie string in its JSON body; it is stored in
// the client's jar and may be cached by callers to resume the session later.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::Session;
use crate::error::Error;
use crate::models::{LoginRequest, LoginResponse};

impl Session {
    /// Authenticate with username/password.
    ///
    /// `POST rest/v1/login-sessions` with `{"userName", "password"}`.
    /// On success the session cookie is stored in the client's jar and
    /// also returned so it can be cached.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<String, Error> {
        let url = self.endpoint(&["login-sessions"])?;
        debug!("logging in at {}", url);

        let body = LoginRequest {
            user_name: username,
            password: password.expose_secret(),
        };

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let LoginResponse { cookie } = resp.json().await.map_err(Error::Transport)?;
        self.store_cookie(&cookie);

        debug!("login successful");
        Ok(cookie)
    }

    /// Resume a previously issued session from its cookie string.
    ///
    /// No request is made; the first real request reports
    /// [`Error::SessionExpired`] if the switch has dropped the session.
    pub fn resume(&self, cookie: &str) {
        self.store_cookie(cookie);
    }

    /// Cheap liveness probe for a resumed session.
    ///
    /// `GET rest/v1/system` is small and requires a valid session.
    pub async fn verify(&self) -> Result<(), Error> {
        let url = self.endpoint(&["system"])?;
        let _: serde_json::Value = self.get(url).await?;
        Ok(())
    }

    /// End the current session.
    ///
    /// `DELETE rest/v1/login-sessions`
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.endpoint(&["login-sessions"])?;
        debug!("logging out at {}", url);
        self.delete(url).await?;
        debug!("logout complete");
        Ok(())
    }
}
