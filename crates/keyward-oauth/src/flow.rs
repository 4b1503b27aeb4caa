//! The authorization code flow state machine.
//!
//! ```text
//! Start -> Authorizing -> AwaitingCode -> ExchangingToken -> FetchingIdentity -> Complete
//!                 \______________\_______________\__________________\____> Error
//! ```
//!
//! Each attempt runs strictly in that order. Calling [`OAuthFlow::start`]
//! while an attempt is outstanding cancels it and starts over with a new
//! `state`. A callback is only accepted in `Authorizing`; anything else is
//! rejected without touching the flow, so a code is never exchanged twice.

use tracing::{debug, info, warn};

use keyward_client::{AuthGateway, Error as ClientError, Identity, NavigationTarget};
use keyward_config::ClientRegistration;

use crate::callback::CallbackParams;
use crate::error::{FailureReason, OAuthError, Result};
use crate::pkce::{PkceChallenge, generate_state};
use crate::request::AuthorizationRequest;
use crate::token;

/// Authorization endpoint, relative to the server base URL.
pub const AUTHORIZE_PATH: &str = "oauth/authorize";
/// Token endpoint, relative to the server base URL.
pub const TOKEN_PATH: &str = "oauth/token";
/// Identity endpoint, relative to the server base URL.
pub const USERINFO_PATH: &str = "oauth/userinfo";

/// Where an attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Start,
    /// Redirected to the authorization server; waiting for the callback.
    Authorizing {
        request: AuthorizationRequest,
        verifier: Option<String>,
    },
    /// A callback has arrived and is being evaluated.
    AwaitingCode,
    /// Holding a code that has not been exchanged yet.
    ExchangingToken {
        code: String,
        verifier: Option<String>,
    },
    /// Credential stored; identity not yet resolved.
    FetchingIdentity,
    Complete(Identity),
    Error(FailureReason),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Authorizing { .. } => "Authorizing",
            Self::AwaitingCode => "AwaitingCode",
            Self::ExchangingToken { .. } => "ExchangingToken",
            Self::FetchingIdentity => "FetchingIdentity",
            Self::Complete(_) => "Complete",
            Self::Error(_) => "Error",
        }
    }

    /// True for states that end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }

    /// True while an attempt is in progress.
    pub fn is_outstanding(&self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Start)
    }
}

/// Drives one authorization attempt at a time.
pub struct OAuthFlow {
    gateway: AuthGateway,
    registration: ClientRegistration,
    use_pkce: bool,
    state: FlowState,
}

impl OAuthFlow {
    pub fn new(gateway: AuthGateway, registration: ClientRegistration) -> Self {
        Self {
            gateway,
            registration,
            use_pkce: false,
            state: FlowState::Start,
        }
    }

    /// Send a PKCE challenge with each authorization request.
    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn registration(&self) -> &ClientRegistration {
        &self.registration
    }

    /// The `state` value of the outstanding authorization request.
    pub fn pending_state(&self) -> Option<&str> {
        match &self.state {
            FlowState::Authorizing { request, .. } => Some(&request.state),
            _ => None,
        }
    }

    /// Begin an attempt with a freshly generated `state`.
    pub fn start(&mut self) -> Result<url::Url> {
        self.start_with_state(generate_state())
    }

    /// Begin an attempt with a caller-supplied `state`.
    ///
    /// Navigates to the authorization endpoint and returns the URL it went to.
    pub fn start_with_state(&mut self, state: impl Into<String>) -> Result<url::Url> {
        if self.state.is_outstanding() {
            warn!(state = self.state.name(), "Restarting outstanding authorization attempt");
        }

        let endpoint = self.gateway.url(AUTHORIZE_PATH)?;
        let mut request = AuthorizationRequest::new(&self.registration, state);
        let verifier = if self.use_pkce {
            let pkce = PkceChallenge::generate();
            request = request.with_pkce(&pkce);
            Some(pkce.verifier)
        } else {
            None
        };

        let url = request.to_url(&endpoint);
        self.state = FlowState::Authorizing { request, verifier };
        info!(client_id = %self.registration.client_id, pkce = self.use_pkce, "Authorization started");

        self.gateway
            .navigator()
            .navigate(NavigationTarget::Authorize(url.clone()));
        Ok(url)
    }

    /// Abandon the outstanding attempt.
    pub fn cancel(&mut self) {
        if self.state.is_outstanding() {
            debug!(state = self.state.name(), "Authorization attempt abandoned");
        }
        self.state = FlowState::Start;
    }

    /// Feed the authorization callback into the machine.
    ///
    /// On success the flow is in `ExchangingToken`.
    pub fn accept_callback(&mut self, params: &CallbackParams) -> Result<()> {
        let (request, verifier) = match std::mem::replace(&mut self.state, FlowState::AwaitingCode) {
            FlowState::Authorizing { request, verifier } => (request, verifier),
            other => {
                let current = other.name();
                self.state = other;
                warn!(state = current, "Callback rejected");
                return Err(OAuthError::UnexpectedCallback { state: current });
            }
        };

        if params.is_empty() {
            return Err(self.fail(FailureReason::MissingCallbackParameters));
        }
        if params.state.as_deref() != Some(request.state.as_str()) {
            return Err(self.fail(FailureReason::StateMismatch));
        }
        if let Some(error) = &params.error {
            return Err(self.fail(FailureReason::AuthorizationDenied {
                error: error.clone(),
                description: params.error_description.clone(),
            }));
        }

        match &params.code {
            Some(code) => {
                debug!("Authorization code received");
                self.state = FlowState::ExchangingToken {
                    code: code.clone(),
                    verifier,
                };
                Ok(())
            }
            None => Err(self.fail(FailureReason::MissingCallbackParameters)),
        }
    }

    /// Exchange the held code for a credential and store it.
    ///
    /// The code is consumed before the request is sent.
    pub async fn exchange_token(&mut self) -> Result<()> {
        // An interrupted exchange leaves the attempt in Error, never holding a code.
        let interrupted = FlowState::Error(FailureReason::TokenExchangeFailed(
            "exchange interrupted".to_string(),
        ));
        let (code, verifier) = match std::mem::replace(&mut self.state, interrupted) {
            FlowState::ExchangingToken { code, verifier } => (code, verifier),
            other => {
                self.state = other;
                return Err(self.invalid("exchange a token"));
            }
        };

        let token = match token::exchange_code(
            self.gateway.http(),
            self.gateway.url(TOKEN_PATH)?,
            self.gateway.timeout(),
            &self.registration,
            &code,
            verifier.as_deref(),
        )
        .await
        {
            Ok(token) => token,
            Err(reason) => return Err(self.fail(reason)),
        };

        let session = self.gateway.session();
        let stored = match token.expires_in() {
            Some(expires_in) => session.set_credential_with_expiry(token.access_token, expires_in),
            None => session.set_credential(token.access_token),
        };
        if let Err(e) = stored {
            return Err(self.fail(FailureReason::StorageUnavailable(e.to_string())));
        }

        self.state = FlowState::FetchingIdentity;
        info!("Credential stored");
        Ok(())
    }

    /// Resolve and cache the identity for the stored credential.
    pub async fn fetch_identity(&mut self) -> Result<Identity> {
        if !matches!(self.state, FlowState::FetchingIdentity) {
            return Err(self.invalid("fetch the identity"));
        }

        let sent_with = self.gateway.session().get_credential();
        let identity = match self.gateway.get::<Identity>(USERINFO_PATH).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(identity_failure(e))),
        };

        let session = self.gateway.session();
        let cached = match sent_with.as_deref() {
            Some(token) => session.set_identity_for(token, &identity),
            None => session.set_identity(&identity),
        };
        match cached {
            Ok(()) => {}
            Err(keyward_session::Error::CredentialChanged) => {
                return Err(self.fail(FailureReason::IdentityFetchFailed {
                    status: None,
                    message: "credential replaced before the identity arrived".to_string(),
                }));
            }
            Err(e) => return Err(self.fail(FailureReason::StorageUnavailable(e.to_string()))),
        }

        info!(user_id = identity.id, "Authorization complete");
        self.state = FlowState::Complete(identity.clone());
        Ok(identity)
    }

    /// Run the rest of the attempt for one callback.
    pub async fn handle_callback(&mut self, params: &CallbackParams) -> Result<Identity> {
        self.accept_callback(params)?;
        self.exchange_token().await?;
        self.fetch_identity().await
    }

    fn fail(&mut self, reason: FailureReason) -> OAuthError {
        warn!(reason = reason.code(), "Authorization failed");
        self.state = FlowState::Error(reason.clone());
        OAuthError::Flow(reason)
    }

    fn invalid(&self, action: &'static str) -> OAuthError {
        OAuthError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }
}

fn identity_failure(error: ClientError) -> FailureReason {
    match error {
        ClientError::Unauthenticated(_) => FailureReason::Unauthenticated,
        ClientError::Network(e) => FailureReason::Network(e.to_string()),
        ClientError::Api {
            status, message, ..
        } => FailureReason::IdentityFetchFailed {
            status: Some(status),
            message,
        },
        ClientError::Storage(e) => FailureReason::StorageUnavailable(e.to_string()),
        other => FailureReason::IdentityFetchFailed {
            status: None,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use keyward_client::RecordingNavigator;
    use keyward_session::{MemoryMedium, SessionStore};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        session: Arc<SessionStore>,
        navigator: Arc<RecordingNavigator>,
        flow: OAuthFlow,
    }

    async fn harness() -> Harness {
        harness_with_session(Arc::new(SessionStore::in_memory()), false).await
    }

    async fn harness_with_session(session: Arc<SessionStore>, use_pkce: bool) -> Harness {
        let server = MockServer::start().await;
        let navigator = Arc::new(RecordingNavigator::new());
        let gateway = AuthGateway::builder()
            .base_url(server.uri())
            .session(session.clone())
            .navigator(navigator.clone())
            .build()
            .unwrap();
        let registration = ClientRegistration::new(
            "test_client_123",
            "test_secret_456",
            "http://127.0.0.1:3000/oauth/callback",
        );
        Harness {
            server,
            session,
            navigator,
            flow: OAuthFlow::new(gateway, registration).with_pkce(use_pkce),
        }
    }

    fn callback(query: &str) -> CallbackParams {
        CallbackParams::from_query(query)
    }

    async fn mount_token(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-abc",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(expected)
            .mount(server)
            .await;
    }

    async fn mount_userinfo(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/oauth/userinfo"))
            .and(header("authorization", "Bearer at-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "ok",
                "data": {
                    "id": 42,
                    "email": "ada@example.com",
                    "name": "Ada",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z"
                }
            })))
            .mount(server)
            .await;
    }

    async fn token_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/oauth/token")
            .count()
    }

    #[tokio::test]
    async fn test_start_navigates_to_authorization_endpoint() {
        let mut h = harness().await;
        let url = h.flow.start_with_state("s1").unwrap();

        assert_eq!(url.path(), "/oauth/authorize");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "test_client_123");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:3000/oauth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "s1");

        assert_eq!(h.flow.state().name(), "Authorizing");
        assert_eq!(h.flow.pending_state(), Some("s1"));
        assert_eq!(h.navigator.targets(), vec![NavigationTarget::Authorize(url)]);
    }

    #[tokio::test]
    async fn test_code_is_exchanged_exactly_once() {
        let mut h = harness().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_id=test_client_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-abc",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        mount_userinfo(&h.server).await;

        h.flow.start_with_state("s1").unwrap();
        h.flow.accept_callback(&callback("code=abc&state=s1")).unwrap();
        assert!(matches!(
            h.flow.state(),
            FlowState::ExchangingToken { code, .. } if code == "abc"
        ));

        h.flow.exchange_token().await.unwrap();
        assert_eq!(h.flow.state(), &FlowState::FetchingIdentity);
        assert_eq!(h.session.get_credential().as_deref(), Some("at-abc"));
        assert!(h.session.credential().unwrap().expires_at.is_some());

        let identity = h.flow.fetch_identity().await.unwrap();
        assert_eq!(identity.id, 42);
        assert_eq!(h.flow.state(), &FlowState::Complete(identity.clone()));
        assert_eq!(h.session.get_identity(), Some(identity));

        // The code is gone: neither a second exchange nor a replayed callback
        // reaches the token endpoint.
        assert!(matches!(
            h.flow.exchange_token().await,
            Err(OAuthError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.flow.accept_callback(&callback("code=abc&state=s1")),
            Err(OAuthError::UnexpectedCallback { state: "Complete" })
        ));
        assert_eq!(token_requests(&h.server).await, 1);
    }

    #[tokio::test]
    async fn test_denied_authorization_sends_no_exchange() {
        let mut h = harness().await;
        mount_token(&h.server, 0).await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("error=access_denied&state=s1"))
            .await
            .unwrap_err();

        assert_eq!(err.reason().map(FailureReason::code), Some("access_denied"));
        assert!(matches!(
            h.flow.state(),
            FlowState::Error(FailureReason::AuthorizationDenied { error, .. }) if error == "access_denied"
        ));
        assert_eq!(token_requests(&h.server).await, 0);
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let mut h = harness().await;
        mount_token(&h.server, 0).await;

        h.flow.start_with_state("s1").unwrap();
        let err = h.flow.handle_callback(&callback("state=s1")).await.unwrap_err();

        assert_eq!(err.reason(), Some(&FailureReason::MissingCallbackParameters));
        assert_eq!(
            h.flow.state(),
            &FlowState::Error(FailureReason::MissingCallbackParameters)
        );
    }

    #[tokio::test]
    async fn test_state_mismatch_sends_no_exchange() {
        let mut h = harness().await;
        mount_token(&h.server, 0).await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=forged"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(&FailureReason::StateMismatch));

        h.flow.start_with_state("s2").unwrap();
        let err = h.flow.handle_callback(&callback("code=abc")).await.unwrap_err();
        assert_eq!(err.reason(), Some(&FailureReason::StateMismatch));
    }

    #[tokio::test]
    async fn test_callback_before_start_leaves_state_untouched() {
        let mut h = harness().await;
        mount_token(&h.server, 0).await;

        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnexpectedCallback { state: "Start" }));
        assert_eq!(h.flow.state(), &FlowState::Start);
    }

    #[tokio::test]
    async fn test_callback_after_cancel_is_unexpected() {
        let mut h = harness().await;
        mount_token(&h.server, 0).await;

        h.flow.start_with_state("s1").unwrap();
        h.flow.cancel();
        assert_eq!(h.flow.state(), &FlowState::Start);
        assert_eq!(h.flow.pending_state(), None);

        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::UnexpectedCallback { state: "Start" }));
        assert_eq!(token_requests(&h.server).await, 0);
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_identity_for_replaced_credential_is_not_cached() {
        let mut h = harness().await;
        mount_token(&h.server, 1).await;
        Mock::given(method("GET"))
            .and(path("/oauth/userinfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "success": true,
                        "message": "ok",
                        "data": {
                            "id": 42,
                            "email": "ada@example.com",
                            "name": "Ada",
                            "created_at": "2024-01-01T00:00:00Z",
                            "updated_at": "2024-01-01T00:00:00Z"
                        }
                    }))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&h.server)
            .await;

        h.flow.start_with_state("s1").unwrap();
        h.flow.accept_callback(&callback("code=abc&state=s1")).unwrap();
        h.flow.exchange_token().await.unwrap();

        let session = h.session.clone();
        let rotate = async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            session.set_credential("rotated").unwrap();
        };
        let (result, ()) = tokio::join!(h.flow.fetch_identity(), rotate);

        assert!(matches!(
            result.unwrap_err().reason(),
            Some(FailureReason::IdentityFetchFailed { status: None, .. })
        ));
        assert_eq!(h.session.get_credential().as_deref(), Some("rotated"));
        assert!(h.session.get_identity().is_none());
    }

    #[tokio::test]
    async fn test_restart_discards_previous_state() {
        let mut h = harness().await;
        mount_token(&h.server, 1).await;
        mount_userinfo(&h.server).await;

        let first = h.flow.start().unwrap();
        let second = h.flow.start().unwrap();
        assert_ne!(first, second);

        let old_state = first
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let err = h
            .flow
            .handle_callback(&callback(&format!("code=abc&state={}", old_state)))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(&FailureReason::StateMismatch));

        h.flow.start_with_state("s3").unwrap();
        h.flow
            .handle_callback(&callback("code=abc&state=s3"))
            .await
            .unwrap();
        assert!(h.flow.state().is_terminal());
    }

    #[tokio::test]
    async fn test_token_rejection_carries_server_reason() {
        let mut h = harness().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "success": false,
                "message": "Invalid authorization code",
                "error": "authorization code already used"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=used&state=s1"))
            .await
            .unwrap_err();

        assert_eq!(
            err.reason(),
            Some(&FailureReason::TokenExchangeRejected {
                status: 400,
                error: "authorization code already used".to_string()
            })
        );
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_token_endpoint_401_does_not_touch_existing_session() {
        let session = Arc::new(SessionStore::in_memory());
        session.set_credential("existing").unwrap();
        let mut h = harness_with_session(session, false).await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "success": false,
                "message": "Invalid client",
                "error": "invalid client credentials"
            })))
            .mount(&h.server)
            .await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();
        assert_eq!(err.reason().map(FailureReason::code), Some("invalid client credentials"));
        assert_eq!(h.session.get_credential().as_deref(), Some("existing"));
        assert_eq!(h.navigator.reauthentications(), 0);
    }

    #[tokio::test]
    async fn test_rejected_userinfo_clears_session() {
        let mut h = harness().await;
        mount_token(&h.server, 1).await;
        Mock::given(method("GET"))
            .and(path("/oauth/userinfo"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "success": false,
                "message": "Invalid token",
                "error": "token revoked"
            })))
            .mount(&h.server)
            .await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();

        assert_eq!(err.reason(), Some(&FailureReason::Unauthenticated));
        assert!(!h.session.is_authenticated());
        assert_eq!(h.navigator.reauthentications(), 1);
    }

    #[tokio::test]
    async fn test_userinfo_server_error() {
        let mut h = harness().await;
        mount_token(&h.server, 1).await;
        Mock::given(method("GET"))
            .and(path("/oauth/userinfo"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "success": false,
                "message": "database unavailable"
            })))
            .mount(&h.server)
            .await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.reason(),
            Some(&FailureReason::IdentityFetchFailed {
                status: Some(500),
                message: "database unavailable".to_string()
            })
        );
        // The credential itself was accepted; only the identity is missing.
        assert!(h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_unwritable_session_fails_the_flow() {
        let medium = MemoryMedium::new();
        medium.set_fail_writes(true);
        let mut h = harness_with_session(Arc::new(SessionStore::open(medium).unwrap()), false).await;
        mount_token(&h.server, 1).await;

        h.flow.start_with_state("s1").unwrap();
        let err = h
            .flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap_err();
        assert_eq!(err.reason().map(FailureReason::code), Some("storage_unavailable"));
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_pkce_challenge_and_verifier() {
        let mut h = harness_with_session(Arc::new(SessionStore::in_memory()), true).await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-abc"
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        mount_userinfo(&h.server).await;

        let url = h.flow.start_with_state("s1").unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["code_challenge_method"], "S256");

        let verifier = match h.flow.state() {
            FlowState::Authorizing { verifier, .. } => verifier.clone().unwrap(),
            other => panic!("unexpected state {}", other.name()),
        };
        assert_eq!(
            PkceChallenge::from_verifier(verifier).challenge,
            params["code_challenge"]
        );

        h.flow
            .handle_callback(&callback("code=abc&state=s1"))
            .await
            .unwrap();
        // No expires_in: the credential has no local expiry.
        assert!(h.session.credential().unwrap().expires_at.is_none());
    }

    #[tokio::test]
    async fn test_userinfo_uses_bearer_header() {
        let mut h = harness().await;
        mount_token(&h.server, 1).await;
        Mock::given(method("GET"))
            .and(path("/oauth/userinfo"))
            .and(query_param("access_token", "at-abc"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&h.server)
            .await;
        mount_userinfo(&h.server).await;

        h.flow.start_with_state("s1").unwrap();
        assert!(h.flow.handle_callback(&callback("code=abc&state=s1")).await.is_ok());
    }

    #[test]
    fn test_state_names() {
        assert!(!FlowState::Start.is_outstanding());
        assert!(FlowState::AwaitingCode.is_outstanding());
        assert!(FlowState::Error(FailureReason::StateMismatch).is_terminal());
    }
}
