//! Startup session restore.
//!
//! Runs once per process. Any doubt about the stored session discards it: a
//! user who has to sign in again is better than one who sees stale data.

use crate::app_state::AppAuthState;
use crate::rpc::{Profile, ProfileRpc};
use crate::token_manager::TokenLifecycleManager;
use crate::AuthError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// How startup resolved the stored session.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// Nothing was stored.
    Anonymous,
    /// The stored session was refreshed and the profile loaded.
    Authenticated(Profile),
    /// A stored session existed but could not be restored; it was wiped.
    Discarded(AuthError),
}

/// Restores the session at startup and marks the app ready.
pub struct AuthBootstrap {
    tokens: TokenLifecycleManager,
    profile_rpc: Arc<dyn ProfileRpc>,
    app_state: AppAuthState,
    outcome: OnceCell<BootstrapOutcome>,
}

impl AuthBootstrap {
    pub fn new(
        tokens: TokenLifecycleManager,
        profile_rpc: Arc<dyn ProfileRpc>,
        app_state: AppAuthState,
    ) -> Self {
        Self {
            tokens,
            profile_rpc,
            app_state,
            outcome: OnceCell::new(),
        }
    }

    /// Run startup restore.
    ///
    /// Repeat and concurrent calls share the first run's outcome; the app is
    /// marked ready exactly once, after auth state has been decided.
    pub async fn run(&self) -> BootstrapOutcome {
        self.outcome
            .get_or_init(|| self.restore())
            .await
            .clone()
    }

    /// Outcome of a completed run, if any.
    pub fn outcome(&self) -> Option<&BootstrapOutcome> {
        self.outcome.get()
    }

    async fn restore(&self) -> BootstrapOutcome {
        let outcome = self.resolve().await;

        match &outcome {
            BootstrapOutcome::Authenticated(profile) => {
                info!(user_id = %profile.id, "Restored stored session");
                self.app_state.set_authenticated(profile.clone());
            }
            BootstrapOutcome::Anonymous => {
                info!("No stored session");
                self.app_state.clear_auth();
            }
            BootstrapOutcome::Discarded(e) => {
                warn!(error = %e, "Discarding stored session");
                self.tokens.clear_all_tokens();
                self.app_state.clear_auth();
            }
        }

        self.app_state.mark_ready();
        outcome
    }

    async fn resolve(&self) -> BootstrapOutcome {
        match self.tokens.has_stored_session() {
            Ok(true) => {}
            Ok(false) => return BootstrapOutcome::Anonymous,
            Err(e) => return BootstrapOutcome::Discarded(e),
        }

        if let Err(e) = self.tokens.refresh_access_token().await {
            return BootstrapOutcome::Discarded(e);
        }

        match self.profile_rpc.fetch_profile().await {
            Ok(profile) => BootstrapOutcome::Authenticated(profile),
            Err(e) => BootstrapOutcome::Discarded(e),
        }
    }
}
