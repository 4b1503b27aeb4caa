//! The authenticated request gateway.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use keyward_session::SharedSessionStore;

use crate::api::{AuthApi, HealthApi};
use crate::error::{Error, Result};
use crate::navigation::{NavigationTarget, NullNavigator, SharedNavigator};
use crate::types::ApiResponse;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway for every request that may need the session credential.
///
/// Before a request is sent the current credential, if any, is attached as a
/// bearer header. A `401` response clears the session, navigates to
/// [`NavigationTarget::Reauthenticate`] and surfaces
/// [`Error::Unauthenticated`]. Every other outcome is handed back unchanged.
#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    session: SharedSessionStore,
    navigator: SharedNavigator,
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthGateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The session this gateway authenticates with.
    pub fn session(&self) -> &SharedSessionStore {
        &self.inner.session
    }

    pub fn navigator(&self) -> &SharedNavigator {
        &self.inner.navigator
    }

    /// The raw HTTP client, for requests that must not go through the
    /// gateway's credential handling.
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Account endpoints under `/api/auth`.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Send a request, attaching the credential and handling `401`.
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = match self.inner.session.get_credential() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.timeout(self.inner.timeout).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let message = error_message(response).await;
            return Err(self.reject(message));
        }
        Ok(response)
    }

    /// GET an enveloped resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self.send(self.inner.http.get(url)).await?;
        unwrap_envelope(response).await
    }

    /// GET an enveloped resource with query parameters.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self.send(self.inner.http.get(url).query(query)).await?;
        unwrap_envelope(response).await
    }

    /// POST a JSON body and read an enveloped response.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self.send(self.inner.http.post(url).json(body)).await?;
        unwrap_envelope(response).await
    }

    fn reject(&self, message: String) -> Error {
        warn!(%message, "Credential rejected; clearing session");
        if let Err(e) = self.inner.session.clear() {
            warn!(error = %e, "Session storage did not accept the clear");
        }
        self.inner.navigator.navigate(NavigationTarget::Reauthenticate);
        Error::Unauthenticated(message)
    }
}

/// Read an envelope and return its `data`.
pub async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(extract_error(response).await);
    }

    let body = response.text().await?;
    let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        return Err(Error::Api {
            status: status.as_u16(),
            code: envelope.error.unwrap_or_else(|| "unsuccessful".to_string()),
            message: envelope.message,
        });
    }

    envelope.data.ok_or_else(|| Error::Api {
        status: status.as_u16(),
        code: "missing_data".to_string(),
        message: "Response envelope carried no data".to_string(),
    })
}

/// Turn a non-2xx response into an [`Error::Api`].
pub async fn extract_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    match response.json::<ApiResponse<serde_json::Value>>().await {
        Ok(envelope) => Error::Api {
            status,
            code: envelope.error.unwrap_or_else(|| "unknown".to_string()),
            message: if envelope.message.is_empty() {
                format!("HTTP {}", status)
            } else {
                envelope.message
            },
        },
        Err(_) => Error::Api {
            status,
            code: "unknown".to_string(),
            message: format!("HTTP {}", status),
        },
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    match response.json::<ApiResponse<serde_json::Value>>().await {
        Ok(envelope) => envelope
            .error
            .filter(|e| !e.is_empty())
            .or(Some(envelope.message).filter(|m| !m.is_empty()))
            .unwrap_or_else(|| format!("HTTP {}", status)),
        Err(_) => format!("HTTP {}", status),
    }
}

/// Builder for an [`AuthGateway`].
pub struct GatewayBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    session: Option<SharedSessionStore>,
    navigator: Option<SharedNavigator>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            session: None,
            navigator: None,
        }
    }

    /// Set the base URL of the authorization / resource server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the session store. Required.
    pub fn session(mut self, session: SharedSessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the navigator. Defaults to [`NullNavigator`].
    pub fn navigator(mut self, navigator: SharedNavigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<AuthGateway> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let session = self
            .session
            .ok_or_else(|| Error::Config("session store is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("keyward-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        debug!(base_url = %base_url, "Gateway built");
        Ok(AuthGateway {
            inner: Arc::new(GatewayInner {
                http,
                base_url,
                timeout: self.timeout,
                session,
                navigator: self.navigator.unwrap_or_else(|| Arc::new(NullNavigator)),
            }),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
