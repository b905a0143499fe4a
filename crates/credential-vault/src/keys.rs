//! Storage key constants.

/// Storage keys used for the session credentials
pub struct StorageKeys;

impl StorageKeys {
    /// Long-lived refresh token (rotated on every refresh)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Token rotation metadata (JSON)
    pub const TOKEN_METADATA: &'static str = "token_metadata";
}
