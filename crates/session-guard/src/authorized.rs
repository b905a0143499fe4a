//! Authenticated calls with one refresh-and-retry.

use crate::coordinator::SessionCoordinator;
use crate::token_manager::TokenLifecycleManager;
use crate::{AuthError, AuthResult};
use std::future::Future;
use tracing::debug;

/// Runs API operations with a valid access token.
///
/// An operation rejected for auth reasons gets one refresh and one retry. When
/// that is not enough the session is handed to the coordinator. Transient
/// failures are returned as-is and never end the session.
#[derive(Clone)]
pub struct AuthorizedCaller {
    tokens: TokenLifecycleManager,
    coordinator: SessionCoordinator,
}

impl AuthorizedCaller {
    pub fn new(tokens: TokenLifecycleManager, coordinator: SessionCoordinator) -> Self {
        Self {
            tokens,
            coordinator,
        }
    }

    /// Run `op` with a bearer token.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> AuthResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let token = match self.tokens.valid_access_token().await {
            Ok(token) => token,
            Err(e) => return Err(self.escalate_refresh_failure(e).await),
        };

        match op(token).await {
            Err(e) if e.requires_session_invalidation() => {
                debug!(error = %e, "Request rejected, refreshing access token and retrying");
            }
            other => return other,
        }

        let token = match self.tokens.refresh_access_token().await {
            Ok(token) => token,
            Err(e) => return Err(self.escalate_refresh_failure(e).await),
        };

        match op(token).await {
            Err(e) if e.requires_session_invalidation() => {
                self.coordinator.handle_unauthorized().await;
                Err(e)
            }
            other => other,
        }
    }

    async fn escalate_refresh_failure(&self, e: AuthError) -> AuthError {
        if e.requires_session_invalidation() {
            self.coordinator.handle_token_refresh_failure().await;
        }
        e
    }
}
