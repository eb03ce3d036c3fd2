//! Shared application state for the gateway

use std::{sync::Arc, time::Duration};

use gigboard_auth::{AuthError, Authenticator, Identity};
use gigboard_config::AuthConfig;
use gigboard_messaging::MessagingService;
use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::warn;

#[derive(Clone)]
pub struct GatewayState {
    pub pool: SqlitePool,
    pub authenticator: Authenticator,
    pub messaging: Arc<MessagingService>,
    /// Upper bound on credential verification during the handshake.
    pub handshake_timeout: Duration,
}

impl GatewayState {
    pub fn new(
        pool: SqlitePool,
        authenticator: Authenticator,
        messaging: Arc<MessagingService>,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            pool,
            authenticator,
            messaging,
            handshake_timeout: auth.handshake_timeout(),
        }
    }

    /// Verify a credential within the handshake deadline.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        match timeout(self.handshake_timeout, self.authenticator.authenticate(credential)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.handshake_timeout.as_millis() as u64, "credential verification timed out");
                Err(AuthError::Invalid("verification timed out".into()))
            }
        }
    }
}
