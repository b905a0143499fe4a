//! Access token lifecycle with single-flight refresh.
//!
//! The access token lives only in memory and is only ever set from a refresh or
//! login response. Refresh tokens rotate on every use, so two concurrent
//! refreshes with the same token would race and one caller would lose its
//! session. All concurrent callers of [`TokenLifecycleManager::refresh_access_token`]
//! therefore share one pending operation:
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► in_flight: Shared<refresh future> ──► RefreshRpc (once)
//! caller C ──┘                     │
//!                                  └── cleared when it settles
//! ```

use crate::claims::{decode_claims, is_expired_at};
use crate::rpc::{IssuedTokens, RefreshRpc};
use crate::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use credential_vault::{SecureTokenStore, TokenMetadata};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use session_config_and_utils::SessionTimings;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type PendingRefresh = Shared<BoxFuture<'static, AuthResult<String>>>;

/// Tuning for expiry detection.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Tokens expiring within this window already count as expired.
    pub expiry_buffer: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            expiry_buffer: Duration::seconds(60),
        }
    }
}

impl From<&SessionTimings> for TokenManagerConfig {
    fn from(timings: &SessionTimings) -> Self {
        Self {
            expiry_buffer: Duration::seconds(timings.expiry_buffer_secs as i64),
        }
    }
}

/// Snapshot of the credentials currently available to this process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// In-memory half of the session.
///
/// `epoch` advances on every wipe so a refresh that started before a logout
/// cannot reinstall credentials after it.
#[derive(Default)]
struct MemorySession {
    access_token: Option<String>,
    epoch: u64,
}

struct TokenState {
    store: SecureTokenStore,
    refresh_rpc: Arc<dyn RefreshRpc>,
    session: RwLock<MemorySession>,
    in_flight: Mutex<Option<PendingRefresh>>,
    config: TokenManagerConfig,
}

/// Owner of the access credential.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    inner: Arc<TokenState>,
}

impl TokenLifecycleManager {
    /// Create a token manager with the default expiry buffer.
    pub fn new(store: SecureTokenStore, refresh_rpc: Arc<dyn RefreshRpc>) -> Self {
        Self::with_config(store, refresh_rpc, TokenManagerConfig::default())
    }

    /// Create a token manager with custom configuration.
    pub fn with_config(
        store: SecureTokenStore,
        refresh_rpc: Arc<dyn RefreshRpc>,
        config: TokenManagerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TokenState {
                store,
                refresh_rpc,
                session: RwLock::new(MemorySession::default()),
                in_flight: Mutex::new(None),
                config,
            }),
        }
    }

    /// Current in-memory access token. No side effects.
    pub fn get_access_token(&self) -> Option<String> {
        self.inner.session.read().access_token.clone()
    }

    /// Whether the in-memory access token is absent, malformed, or about to expire.
    pub fn is_access_token_expired(&self) -> bool {
        match self.get_access_token() {
            Some(token) => is_expired_at(&token, Utc::now(), self.inner.config.expiry_buffer),
            None => true,
        }
    }

    /// Whether a refresh token is stored.
    pub fn has_stored_session(&self) -> AuthResult<bool> {
        Ok(self.inner.store.has_refresh_token()?)
    }

    /// Snapshot of the in-memory access token and the stored refresh token.
    pub fn credential(&self) -> AuthResult<Credential> {
        Ok(Credential {
            access_token: self.get_access_token(),
            refresh_token: self.inner.store.refresh_token()?,
        })
    }

    /// Store the token pair from a successful login.
    pub fn store_session(&self, issued: IssuedTokens) -> AuthResult<String> {
        let epoch = self.inner.session.read().epoch;
        self.inner.install(issued, epoch)
    }

    /// Return the in-memory access token if it is still usable, refreshing otherwise.
    pub async fn valid_access_token(&self) -> AuthResult<String> {
        if !self.is_access_token_expired() {
            if let Some(token) = self.get_access_token() {
                return Ok(token);
            }
        }
        debug!("Access token missing or expiring, refreshing");
        self.refresh_access_token().await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Concurrent callers share a single underlying refresh call and all observe
    /// its result, success or error. The shared operation is discarded once it
    /// settles, so the next call starts fresh.
    pub async fn refresh_access_token(&self) -> AuthResult<String> {
        let pending = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let state = self.inner.clone();
                    let pending = async move {
                        let result = state.perform_refresh().await;
                        state.in_flight.lock().take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Wipe the in-memory access token and the stored refresh credential.
    ///
    /// Storage delete failures are logged and otherwise ignored.
    pub fn clear_all_tokens(&self) {
        let mut session = self.inner.session.write();
        session.access_token = None;
        session.epoch += 1;

        if let Err(e) = self.inner.store.clear() {
            warn!(
                error = %e,
                "Failed to delete stored refresh credential, a stale entry may remain"
            );
        }
        info!("Cleared all tokens");
    }
}

impl TokenState {
    async fn perform_refresh(&self) -> AuthResult<String> {
        let epoch = self.session.read().epoch;
        let refresh_token = self
            .store
            .refresh_token()?
            .ok_or(AuthError::NoRefreshToken)?;

        debug!("Refreshing access token");
        let issued = match self.refresh_rpc.refresh(&refresh_token).await {
            Ok(issued) => issued,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Token refresh failed");
                return Err(e);
            }
        };

        let access_token = self.install(issued, epoch)?;
        info!("Access token refreshed");
        Ok(access_token)
    }

    /// Persist the rotated refresh token, then publish the access token.
    fn install(&self, issued: IssuedTokens, epoch: u64) -> AuthResult<String> {
        let mut session = self.session.write();
        if session.epoch != epoch {
            warn!("Session was cleared while refreshing, discarding issued tokens");
            return Err(AuthError::NoRefreshToken);
        }

        let meta = TokenMetadata {
            access_expiry: decode_claims(&issued.access_token)
                .ok()
                .and_then(|claims| claims.expires_at()),
            refresh_expiry: decode_claims(&issued.refresh_token)
                .ok()
                .and_then(|claims| claims.expires_at()),
            last_refresh: Utc::now(),
        };

        if let Err(e) = self.store.store_rotation(&issued.refresh_token, &meta) {
            error!(error = %e, "Failed to persist rotated refresh token");
            return Err(e.into());
        }

        session.access_token = Some(issued.access_token.clone());
        Ok(issued.access_token)
    }
}
