//! Static client registration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigError, Result};

/// Identifies this consumer to the authorization server.
///
/// Loaded once at startup and never mutated afterwards.
///
/// ```toml
/// [client]
/// client_id = "test_client_123"
/// client_secret = "test_secret_456"
/// redirect_uri = "http://127.0.0.1:3000/oauth/callback"
/// display_name = "Keyward CLI"
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Requested scope, sent only when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_display_name() -> String {
    "Keyward".to_string()
}

impl ClientRegistration {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            display_name: default_display_name(),
            scope: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Check that every field the flow depends on is usable.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                    context: "[client]".to_string(),
                });
            }
        }
        self.redirect_url().map(|_| ())
    }

    /// The redirect URI as a parsed absolute URL.
    pub fn redirect_url(&self) -> Result<Url> {
        Url::parse(&self.redirect_uri).map_err(|e| ConfigError::InvalidUrl {
            field: "client.redirect_uri".to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("display_name", &self.display_name)
            .field("scope", &self.scope)
            .finish()
    }
}
