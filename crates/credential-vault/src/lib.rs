//! Secure storage for the session credentials.
//!
//! This crate provides:
//! - A [`SecureStorage`] trait for key/value secret backends
//! - An OS keychain backend via `keyring` (Keychain, Secret Service, Credential Vault)
//! - An in-memory backend for ephemeral runs and tests
//! - [`SecureTokenStore`], the typed view holding the refresh token and its metadata
//!
//! Access tokens are never written here; they live in process memory only.

mod keychain;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use keychain::KeyringStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token_store::{SecureTokenStore, TokenMetadata};
pub use traits::SecureStorage;

use thiserror::Error;

/// Service name used for all keychain entries.
pub const SERVICE_NAME: &str = "com.session-guard.mobile";

/// Error type for storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default platform storage implementation.
pub fn create_storage() -> StorageResult<Box<dyn SecureStorage>> {
    Ok(Box::new(KeyringStorage::new(SERVICE_NAME)))
}

/// Create a [`SecureTokenStore`] backed by the platform keychain.
pub fn create_token_store() -> StorageResult<SecureTokenStore> {
    let storage = create_storage()?;
    Ok(SecureTokenStore::new(storage))
}
