//! Command implementations.

use super::init::SessionServices;
use session_guard::{decode_claims, AuthStatus, BootstrapOutcome, PAYMENT_PENDING_MESSAGE};
use tracing::warn;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Restore the stored session and print who is signed in.
pub async fn show_status(services: &SessionServices) -> CommandResult {
    match services.bootstrap.run().await {
        BootstrapOutcome::Anonymous => println!("Not signed in"),
        BootstrapOutcome::Authenticated(_) => {}
        BootstrapOutcome::Discarded(e) => {
            println!("Stored session could not be restored: {}", e.user_message());
        }
    }

    let snapshot = services.app_state.snapshot();
    if let AuthStatus::Authenticated(profile) = &snapshot.status {
        println!(
            "Signed in as {}",
            profile.email.as_deref().unwrap_or(&profile.id)
        );
        if let Some(expires_at) = services
            .tokens
            .get_access_token()
            .and_then(|token| decode_claims(&token).ok())
            .and_then(|claims| claims.expires_at())
        {
            println!("Access token expires at {}", expires_at.to_rfc3339());
        }
    }
    println!("Phase: {:?}", services.coordinator.phase());
    Ok(())
}

/// Exchange the stored refresh token for a new access token.
pub async fn force_refresh(services: &SessionServices) -> CommandResult {
    match services.tokens.refresh_access_token().await {
        Ok(_) => {
            println!("Access token refreshed");
            Ok(())
        }
        Err(e) => {
            if e.requires_session_invalidation() {
                services.coordinator.handle_token_refresh_failure().await;
            } else {
                warn!(error = %e, "Refresh failed, stored session kept");
            }
            println!("{}", e.user_message());
            Err(e.into())
        }
    }
}

/// Sign out and wipe stored credentials.
pub async fn logout(services: &SessionServices) -> CommandResult {
    services.coordinator.logout().await;
    Ok(())
}

/// Wait for the resource created by a purchase.
///
/// Running out of attempts is reported as pending and exits successfully:
/// the payment itself already went through.
pub async fn await_purchase(services: &SessionServices, correlation_key: &str) -> CommandResult {
    if !matches!(
        services.bootstrap.run().await,
        BootstrapOutcome::Authenticated(_)
    ) {
        println!("Not signed in");
        return Err("a signed-in session is required".into());
    }

    match services.poller.await_resource(correlation_key).await {
        Ok(resource) => {
            println!(
                "Resource {} is ready (created {})",
                resource.id,
                resource.created_at.to_rfc3339()
            );
            Ok(())
        }
        Err(e) if e.is_payment_pending() => {
            println!("{}", PAYMENT_PENDING_MESSAGE);
            Ok(())
        }
        Err(e) => {
            println!("{}", e.user_message());
            Err(e.into())
        }
    }
}
