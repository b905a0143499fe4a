//! OS keychain backend built on the `keyring` crate.
//!
//! `keyring` picks the platform store: Keychain on macOS/iOS, Secret Service on
//! Linux, Credential Vault on Windows.

use crate::{SecureStorage, StorageError, StorageResult};
use keyring::Entry;
use tracing::debug;

/// Keychain-backed secure storage.
pub struct KeyringStorage {
    service_name: String,
}

impl KeyringStorage {
    /// Create a storage handle scoped to `service_name`.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Entry::new(&self.service_name, key)
            .map_err(|e| StorageError::Platform(format!("Keychain entry error: {}", e)))
    }
}

impl SecureStorage for KeyringStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StorageError::Platform(format!("Keychain set error: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::BadEncoding(_)) => Err(StorageError::Encoding(format!(
                "Keychain entry {} is not valid UTF-8",
                key
            ))),
            Err(e) => Err(StorageError::Platform(format!("Keychain get error: {}", e))),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(StorageError::Platform(format!("Keychain delete error: {}", e))),
        }
    }
}
