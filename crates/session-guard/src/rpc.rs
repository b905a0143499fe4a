//! Remote calls the session core depends on.
//!
//! The transport is injected; [`crate::http_api`] provides the HTTP
//! implementation and tests provide scripted ones.

use crate::AuthResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token pair issued by a refresh or login call.
///
/// The refresh token is rotated on every call; the previous one is dead once
/// this response exists.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("access_token_len", &self.access_token.len())
            .field("refresh_token_len", &self.refresh_token.len())
            .finish()
    }
}

/// Signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A server-side resource created asynchronously after a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub correlation_key: String,
    pub created_at: DateTime<Utc>,
}

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait RefreshRpc: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<IssuedTokens>;
}

/// Fetches the signed-in user's profile.
#[async_trait]
pub trait ProfileRpc: Send + Sync {
    async fn fetch_profile(&self) -> AuthResult<Profile>;
}

/// Lists the user's resources.
#[async_trait]
pub trait ListResourcesRpc: Send + Sync {
    async fn list_resources(&self) -> AuthResult<Vec<Resource>>;
}

/// Application-side effects of a session ending.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Reset application auth state (caches, user data).
    async fn clear_application_state(&self) -> AuthResult<()>;

    /// Send the user to the login screen.
    async fn navigate_to_login(&self);
}
