//! Credential lifecycle for the mobile client.
//!
//! This crate provides:
//! - Access token management with single-flight refresh and rotation
//! - Session-loss coordination (debounced expiration handling, logout suppression)
//! - Startup session restore that fails closed
//! - Bounded polling for resources created after a purchase
//! - HTTP implementations of the refresh, profile and resource RPCs

mod app_state;
mod authorized;
mod bootstrap;
mod claims;
mod coordinator;
mod error;
mod http_api;
mod payment_poller;
mod rpc;
mod scheduler;
mod session_fsm;
mod token_manager;

#[cfg(test)]
mod tests;

pub use app_state::{AppAuthSnapshot, AppAuthState, AuthStatus};
pub use authorized::AuthorizedCaller;
pub use bootstrap::{AuthBootstrap, BootstrapOutcome};
pub use claims::{decode_claims, is_expired_at, ClaimsError, TokenClaims};
pub use coordinator::{
    CoordinatorConfig, ExpirationOutcome, ExpirationTrigger, SessionCoordinator,
};
pub use error::{AuthError, AuthResult, INVALIDATING_ERROR_CODES, PAYMENT_PENDING_MESSAGE};
pub use http_api::{HttpApiClient, HttpRefreshClient};
pub use payment_poller::{latest_match, Liveness, PaymentCompletionPoller, PollConfig};
pub use rpc::{IssuedTokens, ListResourcesRpc, Profile, ProfileRpc, RefreshRpc, Resource, SessionHooks};
pub use session_fsm::{expiration_machine, logout_machine};
pub use session_fsm::{
    ExpirationMachine, ExpirationMachineInput, ExpirationMachineState, LogoutMachine,
    LogoutMachineInput, LogoutMachineState, SessionPhase,
};
pub use token_manager::{Credential, TokenLifecycleManager, TokenManagerConfig};
