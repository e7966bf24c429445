//! Redfish HTTP sessions

use std::time::Duration;

use async_trait::async_trait;
use bmcsweep_secrets::BmcCredentials;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{CrawlError, Result};
use crate::schema::{ServiceRoot, paths};

/// Where and how to open a session
#[derive(Debug, Clone)]
pub struct SessionTarget {
    /// Base URI of the BMC, e.g. `https://10.0.0.5`
    pub uri: String,
    /// Credentials to log in with (may be blank)
    pub credentials: BmcCredentials,
    /// Skip TLS certificate validation
    pub insecure: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Opens authenticated Redfish sessions
#[async_trait]
pub trait RedfishConnector: Send + Sync {
    /// Check the service root and log in
    ///
    /// # Errors
    /// `CrawlError::NotABmc` if the service root is missing,
    /// `CrawlError::AuthenticationFailed` if the credentials are rejected, and
    /// `CrawlError::Transport` for connection failures.
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn RedfishSession>>;
}

/// Authenticated view of one BMC
#[async_trait]
pub trait RedfishSession: Send + Sync {
    /// GET a resource by its `@odata.id` path
    async fn get(&self, path: &str) -> Result<Value>;

    /// Release the session slot on the BMC
    async fn logout(&self) -> Result<()>;
}

/// Map a non-success status to a crawl error
pub(crate) fn status_error(status: StatusCode, path: &str, message: String) -> CrawlError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CrawlError::AuthenticationFailed(format!("{path} returned {status}"))
        }
        _ => CrawlError::Http {
            status: status.as_u16(),
            path: path.to_string(),
            message,
        },
    }
}

fn transport_error(e: &reqwest::Error) -> CrawlError {
    CrawlError::Transport(e.to_string())
}

/// reqwest-backed connector
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

impl HttpConnector {
    /// Create a new connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn build_client(target: &SessionTarget) -> Result<Client> {
        Client::builder()
            .danger_accept_invalid_certs(target.insecure)
            .timeout(target.timeout)
            .build()
            .map_err(|e| transport_error(&e))
    }
}

#[async_trait]
impl RedfishConnector for HttpConnector {
    #[instrument(skip_all, fields(uri = %target.uri))]
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn RedfishSession>> {
        let base_url = Url::parse(&target.uri)?;
        let client = Self::build_client(target)?;

        let root_url = base_url.join(paths::SERVICE_ROOT)?;
        let response = client
            .get(root_url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CrawlError::NotABmc(target.uri.clone()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, paths::SERVICE_ROOT, message));
        }

        let root: ServiceRoot = response.json().await.unwrap_or_default();
        let sessions_path = root.sessions_path();

        let auth = login(&client, &base_url, &sessions_path, &target.credentials).await?;

        Ok(Box::new(HttpSession {
            client,
            base_url,
            auth,
        }))
    }
}

#[derive(Debug, Clone)]
enum SessionAuth {
    /// Session service token and the session resource to delete on logout
    Token { token: String, location: Option<Url> },
    /// Basic auth on every request; no session slot to release
    Basic(BmcCredentials),
}

/// Create a session, falling back to basic auth on BMCs without a session service
async fn login(
    client: &Client,
    base_url: &Url,
    sessions_path: &str,
    credentials: &BmcCredentials,
) -> Result<SessionAuth> {
    let url = base_url.join(sessions_path)?;
    let body = json!({
        "UserName": credentials.username,
        "Password": credentials.password,
    });

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| transport_error(&e))?;

    let status = response.status();
    if status.is_success() {
        let token = response
            .headers()
            .get("X-Auth-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| base_url.join(loc).ok());

        if let Some(token) = token {
            debug!(session = ?location.as_ref().map(Url::as_str), "created Redfish session");
            return Ok(SessionAuth::Token { token, location });
        }

        warn!("session created without X-Auth-Token, using basic auth");
        return Ok(SessionAuth::Basic(credentials.clone()));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CrawlError::AuthenticationFailed(
            format!("session login rejected for user {:?}", credentials.username),
        )),
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
            debug!(%status, "no session service, using basic auth");
            Ok(SessionAuth::Basic(credentials.clone()))
        }
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(status_error(status, sessions_path, message))
        }
    }
}

/// Session against one BMC over HTTPS
pub struct HttpSession {
    client: Client,
    base_url: Url,
    auth: SessionAuth,
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            SessionAuth::Token { token, .. } => request.header("X-Auth-Token", token),
            SessionAuth::Basic(creds) => {
                request.basic_auth(&creds.username, Some(&creds.password))
            }
        }
    }
}

#[async_trait]
impl RedfishSession for HttpSession {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.base_url.join(path)?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, path, message));
        }

        response.json().await.map_err(|e| CrawlError::InvalidResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn logout(&self) -> Result<()> {
        let SessionAuth::Token {
            token,
            location: Some(location),
        } = &self.auth
        else {
            return Ok(());
        };

        let response = self
            .client
            .delete(location.clone())
            .header("X-Auth-Token", token)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, location.path(), message));
        }

        debug!(session = %location, "logged out");
        Ok(())
    }
}
