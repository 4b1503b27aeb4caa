//! Account API.

use tracing::info;

use keyward_session::Identity;

use crate::error::{Error, Result};
use crate::gateway::AuthGateway;
use crate::navigation::NavigationTarget;
use crate::types::{LoginRequest, LoginResponse, RegisterRequest};

/// Account endpoints under `/api/auth`.
pub struct AuthApi {
    gateway: AuthGateway,
}

impl AuthApi {
    pub(crate) fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Identity> {
        let identity: Identity = self.gateway.post("api/auth/register", request).await?;
        info!(user_id = identity.id, "Account registered");
        Ok(identity)
    }

    /// Sign in with email and password.
    ///
    /// Stores the credential, then the identity returned with it.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.gateway.post("api/auth/login", &request).await?;

        let session = self.gateway.session();
        session.set_credential(response.token.clone())?;
        session.set_identity_for(&response.token, &response.user)?;

        info!(user_id = response.user.id, "Signed in");
        Ok(response.user)
    }

    /// Fetch the current identity and refresh the cached copy.
    ///
    /// Fails with a storage error if the credential was replaced while the
    /// request was in flight.
    pub async fn me(&self) -> Result<Identity> {
        let session = self.gateway.session();
        let sent_with = session.get_credential();
        let identity: Identity = self.gateway.get("api/auth/me").await?;
        match sent_with {
            Some(token) => session.set_identity_for(&token, &identity)?,
            None => session.set_identity(&identity)?,
        }
        Ok(identity)
    }

    /// Drop the local session and return to the login entry point.
    pub fn logout(&self) -> Result<()> {
        let result = self.gateway.session().clear();
        self.gateway.navigator().navigate(NavigationTarget::Reauthenticate);
        info!("Signed out");
        result.map_err(Error::from)
    }
}
