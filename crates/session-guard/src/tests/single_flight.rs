//! Single-flight refresh tests.
//!
//! Covered:
//! - concurrent callers share exactly one refresh RPC and its result
//! - a failed refresh is seen by every joined caller and leaves storage alone
//! - the shared operation is dropped once settled
//! - a logout during a refresh wins over the refresh's result

use super::harness::{issued, rejected, Fixture};
use crate::AuthError;
use futures::future::join_all;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_refresh() {
    let fixture = Fixture::signed_in();
    fixture.refresh.set_latency(Duration::from_millis(100));

    let results = join_all((0..10).map(|_| fixture.tokens.refresh_access_token())).await;

    assert_eq!(fixture.refresh.calls(), 1);
    let expected = issued(1).access_token;
    for result in results {
        assert_eq!(result.unwrap(), expected);
    }
    assert_eq!(fixture.tokens.get_access_token(), Some(expected));
    assert_eq!(fixture.storage.stored_refresh_token().as_deref(), Some("refresh-1"));
    assert!(fixture.storage.has_metadata());
}

#[tokio::test(start_paused = true)]
async fn spawned_callers_share_one_refresh() {
    let fixture = Fixture::signed_in();
    fixture.refresh.set_latency(Duration::from_millis(100));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tokens = fixture.tokens.clone();
            tokio::spawn(async move { tokens.refresh_access_token().await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(fixture.refresh.calls(), 1);
    assert_eq!(fixture.refresh.seen(), vec!["refresh-0".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_is_shared_and_changes_nothing() {
    let fixture = Fixture::signed_in();
    fixture.refresh.set_latency(Duration::from_millis(50));
    fixture.refresh.push(Err(rejected("INVALID_REFRESH_TOKEN")));

    let results = join_all((0..5).map(|_| fixture.tokens.refresh_access_token())).await;

    assert_eq!(fixture.refresh.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap_err(), rejected("INVALID_REFRESH_TOKEN"));
    }
    assert!(fixture.tokens.get_access_token().is_none());
    assert_eq!(fixture.storage.stored_refresh_token().as_deref(), Some("refresh-0"));
}

#[tokio::test]
async fn settled_refresh_is_not_reused() {
    let fixture = Fixture::signed_in();

    fixture.tokens.refresh_access_token().await.unwrap();
    let second = fixture.tokens.refresh_access_token().await.unwrap();

    assert_eq!(fixture.refresh.calls(), 2);
    assert_eq!(second, issued(2).access_token);
    // The second call presented the token rotated in by the first
    assert_eq!(
        fixture.refresh.seen(),
        vec!["refresh-0".to_string(), "refresh-1".to_string()]
    );
}

#[tokio::test]
async fn retry_after_failure_starts_a_new_refresh() {
    let fixture = Fixture::signed_in();
    fixture
        .refresh
        .push(Err(AuthError::TransientNetwork("offline".to_string())));

    let first = fixture.tokens.refresh_access_token().await;
    assert!(first.unwrap_err().is_transient());

    let second = fixture.tokens.refresh_access_token().await;
    assert!(second.is_ok());
    assert_eq!(fixture.refresh.calls(), 2);
}

#[tokio::test]
async fn missing_refresh_token_never_calls_server() {
    let fixture = Fixture::new();

    let err = fixture.tokens.refresh_access_token().await.unwrap_err();
    assert_eq!(err, AuthError::NoRefreshToken);
    assert_eq!(fixture.refresh.calls(), 0);
}

#[tokio::test]
async fn storage_write_failure_fails_refresh() {
    let fixture = Fixture::signed_in();
    fixture.storage.fail_writes(true);

    let err = fixture.tokens.refresh_access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    assert!(fixture.tokens.get_access_token().is_none());
}

#[tokio::test(start_paused = true)]
async fn logout_during_refresh_discards_issued_tokens() {
    let fixture = Fixture::signed_in();
    fixture.refresh.set_latency(Duration::from_millis(200));

    let tokens = fixture.tokens.clone();
    let pending = tokio::spawn(async move { tokens.refresh_access_token().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.refresh.calls(), 1);
    fixture.tokens.clear_all_tokens();

    let result = pending.await.unwrap();
    assert_eq!(result.unwrap_err(), AuthError::NoRefreshToken);
    assert!(fixture.tokens.get_access_token().is_none());
    assert!(fixture.storage.stored_refresh_token().is_none());
}

#[tokio::test(start_paused = true)]
async fn valid_access_token_refreshes_once_for_concurrent_callers() {
    let fixture = Fixture::signed_in();
    fixture.refresh.set_latency(Duration::from_millis(100));

    let results = join_all((0..6).map(|_| fixture.tokens.valid_access_token())).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(fixture.refresh.calls(), 1);

    // Token is fresh now; no further refresh
    fixture.tokens.valid_access_token().await.unwrap();
    assert_eq!(fixture.refresh.calls(), 1);
}

#[tokio::test]
async fn clear_swallows_delete_failures() {
    let fixture = Fixture::signed_in();
    fixture.tokens.refresh_access_token().await.unwrap();
    fixture.storage.fail_deletes(true);

    fixture.tokens.clear_all_tokens();

    assert!(fixture.tokens.get_access_token().is_none());
    assert_eq!(fixture.storage.stored_refresh_token().as_deref(), Some("refresh-1"));
}
