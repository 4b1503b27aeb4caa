//! Gate for operations that require a session.

use chrono::Utc;
use tracing::{debug, warn};

use keyward_session::Identity;

use crate::error::{Error, Result};
use crate::gateway::AuthGateway;
use crate::navigation::NavigationTarget;

/// Admits callers only while a live session exists.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    gateway: AuthGateway,
}

impl AuthGuard {
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    /// Return the current identity, or redirect and fail with
    /// [`Error::NotAuthenticated`].
    ///
    /// An expired credential is treated as absent and cleared. When the
    /// identity cache is empty it is fetched through the gateway, so a
    /// rejected credential is cleared there.
    pub async fn ensure(&self) -> Result<Identity> {
        let session = self.gateway.session();

        let Some(credential) = session.credential() else {
            debug!("No credential; redirecting to login");
            self.gateway.navigator().navigate(NavigationTarget::Reauthenticate);
            return Err(Error::NotAuthenticated);
        };

        if credential.is_expired_at(Utc::now()) {
            warn!("Credential expired; clearing session");
            if let Err(e) = session.clear() {
                warn!(error = %e, "Session storage did not accept the clear");
            }
            self.gateway.navigator().navigate(NavigationTarget::Reauthenticate);
            return Err(Error::NotAuthenticated);
        }

        if let Some(identity) = session.get_identity() {
            return Ok(identity);
        }

        debug!("Identity not cached; fetching");
        self.gateway.auth().me().await
    }
}
