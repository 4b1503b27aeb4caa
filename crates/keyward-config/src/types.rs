//! Configuration types.
//!
//! Every top-level section is optional so that layers can be merged: a later
//! layer that defines a section replaces the earlier one wholesale.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::registration::ClientRegistration;
use crate::{ConfigError, Result};

/// Default server base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default time to wait for the authorization callback, in seconds.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Environment variable overriding `server.base_url`.
pub const ENV_SERVER_URL: &str = "KEYWARD_SERVER_URL";
/// Environment variable overriding `client.client_id`.
pub const ENV_CLIENT_ID: &str = "KEYWARD_CLIENT_ID";
/// Environment variable overriding `client.client_secret`.
pub const ENV_CLIENT_SECRET: &str = "KEYWARD_CLIENT_SECRET";
/// Environment variable overriding `client.redirect_uri`.
pub const ENV_REDIRECT_URI: &str = "KEYWARD_REDIRECT_URI";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywardConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientRegistration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSettings>,
}

impl KeywardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: KeywardConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.client.is_some() {
            self.client = other.client;
        }
        if other.oauth.is_some() {
            self.oauth = other.oauth;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
    }

    /// Apply `KEYWARD_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides using `lookup` as the environment.
    ///
    /// A `[client]` section is synthesized only when id, secret and redirect
    /// URI are all provided; otherwise individual fields override an existing
    /// section.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_SERVER_URL) {
            self.server.get_or_insert_with(ServerConfig::default).base_url = url;
        }

        let id = get(ENV_CLIENT_ID);
        let secret = get(ENV_CLIENT_SECRET);
        let redirect = get(ENV_REDIRECT_URI);

        match self.client.as_mut() {
            Some(client) => {
                if let Some(id) = id {
                    client.client_id = id;
                }
                if let Some(secret) = secret {
                    client.client_secret = secret;
                }
                if let Some(redirect) = redirect {
                    client.redirect_uri = redirect;
                }
            }
            None => {
                if let (Some(id), Some(secret), Some(redirect)) = (id, secret, redirect) {
                    self.client = Some(ClientRegistration::new(id, secret, redirect));
                }
            }
        }
    }

    /// Effective server settings.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Effective OAuth settings.
    pub fn oauth(&self) -> OAuthSettings {
        self.oauth.clone().unwrap_or_default()
    }

    /// The validated client registration.
    pub fn client_registration(&self) -> Result<&ClientRegistration> {
        let client = self
            .client
            .as_ref()
            .ok_or(ConfigError::NoClientRegistration)?;
        client.validate()?;
        Ok(client)
    }

    /// Where the session document lives.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session
            .as_ref()
            .and_then(|s| s.path.clone())
            .map(expand_home)
            .or_else(|| crate::xdg_config_dir().map(|d| d.join(SESSION_FILE)))
    }
}

/// Default session document name within the config directory.
pub const SESSION_FILE: &str = "session.json";

fn expand_home(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the authorization / resource server.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Parsed base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            field: "server.base_url".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[oauth]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Send a PKCE S256 challenge with the authorization request.
    pub use_pkce: bool,
    /// How long to wait for the authorization callback.
    pub callback_timeout_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            use_pkce: false,
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl OAuthSettings {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Override for the session document path. `~` expands to the home directory.
    pub path: Option<PathBuf>,
}
