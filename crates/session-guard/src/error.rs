//! Session error types.

use credential_vault::StorageError;
use thiserror::Error;

/// Server error codes that mean the session is gone.
pub const INVALIDATING_ERROR_CODES: [&str; 3] =
    ["INVALID_TOKEN", "INVALID_REFRESH_TOKEN", "UNAUTHORIZED"];

/// Message shown when polling gives up after a successful payment.
pub const PAYMENT_PENDING_MESSAGE: &str =
    "Your payment went through. We're still finishing up, check back shortly.";

/// Session error type.
///
/// `Clone` so one settled refresh can be handed to every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No refresh token is stored
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The server rejected the refresh token or the access token
    #[error("Authorization rejected ({code}): {message}")]
    AuthRejected {
        code: String,
        status: Option<u16>,
        message: String,
    },

    /// Connectivity failure or server-side outage
    #[error("Network unavailable: {0}")]
    TransientNetwork(String),

    /// Bounded polling ran out of attempts
    #[error("Result still pending after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    /// Secure storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected response shape or status
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// Application state callback failed
    #[error("Application state error: {0}")]
    AppState(String),
}

impl AuthError {
    /// Classify a failed API response.
    ///
    /// Invalidating codes and HTTP 401 become `AuthRejected`; 5xx is treated as
    /// transient; everything else is a protocol error.
    pub fn from_api_failure(status: Option<u16>, code: Option<&str>, message: &str) -> Self {
        let code_invalidates = code
            .map(|c| INVALIDATING_ERROR_CODES.contains(&c))
            .unwrap_or(false);

        if code_invalidates || status == Some(401) {
            return AuthError::AuthRejected {
                code: code.unwrap_or("UNAUTHORIZED").to_string(),
                status,
                message: message.to_string(),
            };
        }

        match status {
            Some(s) if (500..600).contains(&s) => {
                AuthError::TransientNetwork(format!("HTTP {}: {}", s, message))
            }
            Some(s) => AuthError::Protocol(format!(
                "HTTP {} ({}): {}",
                s,
                code.unwrap_or("UNKNOWN"),
                message
            )),
            None => AuthError::Protocol(message.to_string()),
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::TransientNetwork(_))
    }

    /// Returns true if this error means the session can no longer be used.
    pub fn requires_session_invalidation(&self) -> bool {
        matches!(
            self,
            AuthError::AuthRejected { .. } | AuthError::NoRefreshToken
        )
    }

    /// Returns true if this is a poll timeout after an already-successful payment.
    pub fn is_payment_pending(&self) -> bool {
        matches!(self, AuthError::PollTimeout { .. })
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::PollTimeout { .. } => PAYMENT_PENDING_MESSAGE.to_string(),
            AuthError::NoRefreshToken | AuthError::AuthRejected { .. } => {
                "Your session has ended. Please sign in again.".to_string()
            }
            AuthError::TransientNetwork(_) => {
                "You appear to be offline. Please try again.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            return AuthError::TransientNetwork(err.to_string());
        }
        if let Some(status) = err.status() {
            return AuthError::from_api_failure(Some(status.as_u16()), None, &err.to_string());
        }
        if err.is_request() {
            return AuthError::TransientNetwork(err.to_string());
        }
        AuthError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Protocol(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidating_codes_map_to_auth_rejected() {
        for code in INVALIDATING_ERROR_CODES {
            let err = AuthError::from_api_failure(Some(400), Some(code), "nope");
            assert!(err.requires_session_invalidation(), "{} must invalidate", code);
        }
    }

    #[test]
    fn test_http_401_without_code_is_auth_rejected() {
        let err = AuthError::from_api_failure(Some(401), None, "expired");
        assert_eq!(
            err,
            AuthError::AuthRejected {
                code: "UNAUTHORIZED".to_string(),
                status: Some(401),
                message: "expired".to_string(),
            }
        );
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = AuthError::from_api_failure(Some(503), None, "maintenance");
        assert!(err.is_transient());
        assert!(!err.requires_session_invalidation());
    }

    #[test]
    fn test_other_client_error_is_protocol() {
        let err = AuthError::from_api_failure(Some(422), Some("VALIDATION"), "bad field");
        assert!(matches!(err, AuthError::Protocol(_)));
        assert!(!err.is_transient());
        assert!(!err.requires_session_invalidation());
    }

    #[test]
    fn test_no_refresh_token_invalidates() {
        assert!(AuthError::NoRefreshToken.requires_session_invalidation());
        assert!(!AuthError::NoRefreshToken.is_transient());
    }

    #[test]
    fn test_poll_timeout_is_pending_not_failure() {
        let err = AuthError::PollTimeout { attempts: 15 };
        assert!(err.is_payment_pending());
        assert!(!err.requires_session_invalidation());
        assert_eq!(err.user_message(), PAYMENT_PENDING_MESSAGE);
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: AuthError = StorageError::Platform("locked".to_string()).into();
        assert_eq!(
            err,
            AuthError::Storage("Platform storage error: locked".to_string())
        );
    }
}
