// Switch REST API HTTP client
//
// Wraps `reqwest::Client` with `rest/v1` URL construction, session cookie
// handling, and status mapping. Endpoint groups (vlans, ports, routes, acls)
// are implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use std::sync::Arc;

use reqwest::cookie::Jar;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const REST_PREFIX: &str = "rest/v1/";

/// An authenticated session against one switch.
///
/// Cheap to clone: the underlying `reqwest::Client` and cookie jar are
/// reference counted, so clones share the same session cookie.
#[derive(Clone, Debug)]
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    rest_url: Url,
    cookie_jar: Option<Arc<Jar>>,
}

impl Session {
    /// Create an unauthenticated session from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the switch authenticates by cookie). Call
    /// [`login`](Self::login) or [`resume`](Self::resume) before issuing
    /// requests.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        let rest_url = base_url.join(REST_PREFIX)?;
        Ok(Self {
            http,
            base_url,
            rest_url,
            cookie_jar,
        })
    }

    /// Create a session with a pre-built `reqwest::Client`.
    ///
    /// Use this when the client already carries the session cookie
    /// (tests, or callers managing their own cookie store).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Result<Self, Error> {
        let rest_url = base_url.join(REST_PREFIX)?;
        Ok(Self {
            http,
            base_url,
            rest_url,
            cookie_jar: None,
        })
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Seed the cookie jar with a previously issued `sessionId=...` cookie.
    pub(crate) fn store_cookie(&self, cookie: &str) {
        if let Some(ref jar) = self.cookie_jar {
            trace!("storing session cookie");
            jar.add_cookie_str(cookie, &self.base_url);
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/rest/v1/{segments...}`, percent-encoding each segment
    /// so port ids like `1/1/3` or ACL names with spaces stay intact.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.rest_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        Self::parse_json(resp).await
    }

    /// Send a POST request with JSON body and decode the JSON answer.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_json(resp).await
    }

    /// Send a PUT request with JSON body and decode the JSON answer.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PUT {}", url);
        let resp = self
            .http
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_json(resp).await
    }

    /// Send a DELETE request. The switch answers 204 with no body.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::check_status(resp).await.map(|_| ())
    }

    /// Map HTTP status codes onto the error taxonomy.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview,
            });
        }

        Ok(resp)
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await.map_err(Error::Transport)?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
