//! Session hooks for a terminal front end.

use async_trait::async_trait;
use session_guard::{AppAuthState, AuthResult, SessionHooks};
use tracing::info;

/// Clears the shared auth state and tells the user to sign in again.
pub struct TerminalHooks {
    app_state: AppAuthState,
}

impl TerminalHooks {
    pub fn new(app_state: AppAuthState) -> Self {
        Self { app_state }
    }
}

#[async_trait]
impl SessionHooks for TerminalHooks {
    async fn clear_application_state(&self) -> AuthResult<()> {
        self.app_state.clear_auth();
        Ok(())
    }

    async fn navigate_to_login(&self) {
        info!("Routing to login");
        println!("Signed out. Sign in again to continue.");
    }
}
