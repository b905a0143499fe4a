//! Startup restore tests.
//!
//! Covered:
//! - nothing stored: anonymous and ready, no network
//! - stored session refreshed and profile loaded: authenticated and ready
//! - any failure discards the stored session and ends anonymous and ready
//! - ready is set exactly once across repeat and concurrent runs

use super::harness::{profile, rejected, Fixture, ScriptedProfile};
use crate::{AppAuthState, AuthBootstrap, AuthError, AuthStatus, BootstrapOutcome};
use std::sync::Arc;

struct BootstrapFixture {
    base: Fixture,
    profile: Arc<ScriptedProfile>,
    app_state: AppAuthState,
    bootstrap: AuthBootstrap,
}

impl BootstrapFixture {
    fn over(base: Fixture) -> Self {
        let profile = Arc::new(ScriptedProfile::new());
        let app_state = AppAuthState::new();
        let bootstrap =
            AuthBootstrap::new(base.tokens.clone(), profile.clone(), app_state.clone());
        Self {
            base,
            profile,
            app_state,
            bootstrap,
        }
    }
}

#[tokio::test]
async fn nothing_stored_is_anonymous() {
    let fx = BootstrapFixture::over(Fixture::new());

    assert_eq!(fx.bootstrap.run().await, BootstrapOutcome::Anonymous);

    let snapshot = fx.app_state.snapshot();
    assert!(snapshot.ready);
    assert_eq!(snapshot.status, AuthStatus::Anonymous);
    assert_eq!(fx.base.refresh.calls(), 0);
    assert_eq!(fx.profile.calls(), 0);
}

#[tokio::test]
async fn stored_session_is_restored() {
    let fx = BootstrapFixture::over(Fixture::signed_in());

    let outcome = fx.bootstrap.run().await;

    assert_eq!(outcome, BootstrapOutcome::Authenticated(profile("user-1")));
    let snapshot = fx.app_state.snapshot();
    assert!(snapshot.ready);
    assert_eq!(snapshot.profile(), Some(&profile("user-1")));
    assert!(fx.base.tokens.get_access_token().is_some());
    assert_eq!(
        fx.base.storage.stored_refresh_token().as_deref(),
        Some("refresh-1")
    );
}

#[tokio::test]
async fn rejected_refresh_discards_session() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    fx.base.refresh.push(Err(rejected("INVALID_REFRESH_TOKEN")));

    let outcome = fx.bootstrap.run().await;

    assert_eq!(
        outcome,
        BootstrapOutcome::Discarded(rejected("INVALID_REFRESH_TOKEN"))
    );
    assert!(fx.base.storage.stored_refresh_token().is_none());
    assert!(fx.app_state.is_ready());
    assert!(!fx.app_state.snapshot().is_authenticated());
    assert_eq!(fx.profile.calls(), 0);
}

#[tokio::test]
async fn offline_refresh_also_discards_session() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    fx.base
        .refresh
        .push(Err(AuthError::TransientNetwork("offline".to_string())));

    let outcome = fx.bootstrap.run().await;

    assert!(matches!(outcome, BootstrapOutcome::Discarded(ref e) if e.is_transient()));
    assert!(fx.base.storage.stored_refresh_token().is_none());
    assert!(fx.app_state.is_ready());
}

#[tokio::test]
async fn profile_failure_discards_session() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    fx.profile
        .push(Err(AuthError::Protocol("HTTP 500".to_string())));

    let outcome = fx.bootstrap.run().await;

    assert!(matches!(outcome, BootstrapOutcome::Discarded(_)));
    assert!(fx.base.tokens.get_access_token().is_none());
    assert!(fx.base.storage.stored_refresh_token().is_none());
    assert!(fx.app_state.is_ready());
    assert!(!fx.app_state.snapshot().is_authenticated());
}

#[tokio::test]
async fn unreadable_storage_discards_session() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    fx.base.storage.fail_reads(true);

    let outcome = fx.bootstrap.run().await;

    assert!(matches!(outcome, BootstrapOutcome::Discarded(AuthError::Storage(_))));
    assert!(fx.app_state.is_ready());
    assert_eq!(fx.base.refresh.calls(), 0);
}

#[tokio::test]
async fn discard_does_not_navigate() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    fx.base.refresh.push(Err(rejected("INVALID_TOKEN")));

    fx.bootstrap.run().await;

    assert_eq!(fx.base.hooks.navigations(), 0);
}

#[tokio::test]
async fn repeat_runs_reuse_first_outcome() {
    let fx = BootstrapFixture::over(Fixture::signed_in());

    let first = fx.bootstrap.run().await;
    let second = fx.bootstrap.run().await;

    assert_eq!(first, second);
    assert_eq!(fx.base.refresh.calls(), 1);
    assert_eq!(fx.profile.calls(), 1);
    assert_eq!(fx.bootstrap.outcome(), Some(&first));
}

#[tokio::test]
async fn concurrent_runs_mark_ready_once() {
    let fx = BootstrapFixture::over(Fixture::signed_in());
    let mut rx = fx.app_state.subscribe();

    let (a, b) = tokio::join!(fx.bootstrap.run(), fx.bootstrap.run());
    assert_eq!(a, b);
    assert_eq!(fx.base.refresh.calls(), 1);

    // Subscribers observe the settled state
    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert!(snapshot.ready);
    assert!(snapshot.is_authenticated());
}
