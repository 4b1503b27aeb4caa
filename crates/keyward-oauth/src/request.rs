//! The authorization request.

use url::Url;

use keyward_config::ClientRegistration;

use crate::pkce::{CHALLENGE_METHOD, PkceChallenge};

/// One authorization request, created per flow attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: &'static str,
    pub state: String,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(registration: &ClientRegistration, state: impl Into<String>) -> Self {
        Self {
            client_id: registration.client_id.clone(),
            redirect_uri: registration.redirect_uri.clone(),
            response_type: "code",
            state: state.into(),
            scope: registration.scope.clone(),
            code_challenge: None,
        }
    }

    /// Attach a PKCE challenge.
    pub fn with_pkce(mut self, pkce: &PkceChallenge) -> Self {
        self.code_challenge = Some(pkce.challenge.clone());
        self
    }

    /// Full authorization URL against `endpoint`.
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", self.response_type)
                .append_pair("state", &self.state);
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
            if let Some(challenge) = &self.code_challenge {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", CHALLENGE_METHOD);
            }
        }
        url
    }
}
