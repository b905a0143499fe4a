//! Service construction.

use super::hooks::TerminalHooks;
use async_trait::async_trait;
use credential_vault::{create_token_store, MemoryStorage, SecureTokenStore};
use session_config_and_utils::Config;
use session_guard::{
    AppAuthState, AuthBootstrap, AuthResult, AuthorizedCaller, CoordinatorConfig, HttpApiClient,
    HttpRefreshClient, ListResourcesRpc, PaymentCompletionPoller, PollConfig, Resource,
    SessionCoordinator, TokenLifecycleManager, TokenManagerConfig,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a command needs, wired once per process.
pub struct SessionServices {
    pub tokens: TokenLifecycleManager,
    pub coordinator: SessionCoordinator,
    pub app_state: AppAuthState,
    pub bootstrap: AuthBootstrap,
    pub poller: PaymentCompletionPoller,
}

/// Resource listing that refreshes and retries on auth rejection.
struct AuthorizedResources {
    caller: AuthorizedCaller,
    api: HttpApiClient,
}

#[async_trait]
impl ListResourcesRpc for AuthorizedResources {
    async fn list_resources(&self) -> AuthResult<Vec<Resource>> {
        self.caller
            .call(|access_token| async move { self.api.list_resources_with(&access_token).await })
            .await
    }
}

/// Build the session services from configuration.
pub fn build_services(
    config: &Config,
    ephemeral: bool,
) -> Result<SessionServices, Box<dyn std::error::Error>> {
    let base_url = config.api_base_url()?;
    info!(api_base_url = %base_url, ephemeral, "Configuration loaded");

    let store = if ephemeral {
        debug!("Using in-memory credential storage");
        SecureTokenStore::new(Box::new(MemoryStorage::new()))
    } else {
        create_token_store()?
    };

    let tokens = TokenLifecycleManager::with_config(
        store,
        Arc::new(HttpRefreshClient::new(base_url.clone())),
        TokenManagerConfig::from(&config.session),
    );

    let app_state = AppAuthState::new();
    let coordinator = SessionCoordinator::with_config(
        tokens.clone(),
        Arc::new(TerminalHooks::new(app_state.clone())),
        CoordinatorConfig::from(&config.session),
    );

    let api = HttpApiClient::new(base_url, tokens.clone());
    let bootstrap = AuthBootstrap::new(tokens.clone(), Arc::new(api.clone()), app_state.clone());
    let poller = PaymentCompletionPoller::with_config(
        Arc::new(AuthorizedResources {
            caller: AuthorizedCaller::new(tokens.clone(), coordinator.clone()),
            api,
        }),
        PollConfig::from(&config.poller),
    );

    Ok(SessionServices {
        tokens,
        coordinator,
        app_state,
        bootstrap,
        poller,
    })
}
