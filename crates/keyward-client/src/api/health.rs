//! Health API.

use crate::error::{Error, Result};
use crate::gateway::{AuthGateway, unwrap_envelope};
use crate::types::HealthStatus;

/// Health API client.
///
/// `/health` is public, so requests bypass the gateway's credential handling.
pub struct HealthApi {
    gateway: AuthGateway,
}

impl HealthApi {
    pub(crate) fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    pub async fn check(&self) -> Result<HealthStatus> {
        let url = self.gateway.url("health")?;
        let response = self
            .gateway
            .http()
            .get(url)
            .timeout(self.gateway.timeout())
            .send()
            .await
            .map_err(Error::from)?;
        unwrap_envelope(response).await
    }

    /// Simple connectivity check.
    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok_and(|h| h.status == "healthy")
    }
}
