//! Typed access to the persisted refresh credential.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Rotation metadata persisted next to the refresh token.
///
/// Advisory only: the access token's own `exp` claim is authoritative for
/// access-token validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    /// Expiry of the access token issued alongside this refresh token.
    #[serde(default)]
    pub access_expiry: Option<DateTime<Utc>>,
    /// Expiry of the refresh token, when the server encodes one.
    #[serde(default)]
    pub refresh_expiry: Option<DateTime<Utc>>,
    /// When the last successful rotation happened.
    pub last_refresh: DateTime<Utc>,
}

/// Durable store for the refresh token and its metadata.
pub struct SecureTokenStore {
    storage: Box<dyn SecureStorage>,
}

impl SecureTokenStore {
    /// Create a token store over the given storage backend.
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the refresh token, if one is stored.
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Whether a refresh token is stored.
    pub fn has_refresh_token(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::REFRESH_TOKEN)
    }

    /// Retrieve rotation metadata.
    ///
    /// Corrupt metadata is reported as `None` rather than an error since it
    /// never decides validity.
    pub fn metadata(&self) -> StorageResult<Option<TokenMetadata>> {
        match self.storage.get(StorageKeys::TOKEN_METADATA)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable token metadata");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Persist a rotated refresh token and its metadata.
    ///
    /// The refresh token is written first: once the server has rotated it the
    /// previous value is dead, so it must not survive a partial write.
    pub fn store_rotation(&self, refresh_token: &str, meta: &TokenMetadata) -> StorageResult<()> {
        let json =
            serde_json::to_string(meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token)?;
        self.storage.set(StorageKeys::TOKEN_METADATA, &json)?;
        debug!(last_refresh = %meta.last_refresh, "Stored rotated refresh token");
        Ok(())
    }

    /// Delete the refresh token and metadata.
    ///
    /// Both deletes are always attempted; the first failure is returned.
    pub fn clear(&self) -> StorageResult<()> {
        let token = self.storage.delete(StorageKeys::REFRESH_TOKEN);
        let meta = self.storage.delete(StorageKeys::TOKEN_METADATA);
        token?;
        meta?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use chrono::Duration;

    fn sample_meta() -> TokenMetadata {
        let now = Utc::now();
        TokenMetadata {
            access_expiry: Some(now + Duration::minutes(15)),
            refresh_expiry: None,
            last_refresh: now,
        }
    }

    #[test]
    fn test_empty_store() {
        let store = SecureTokenStore::new(Box::new(MemoryStorage::new()));
        assert!(!store.has_refresh_token().unwrap());
        assert!(store.refresh_token().unwrap().is_none());
        assert!(store.metadata().unwrap().is_none());
    }

    #[test]
    fn test_store_rotation_then_clear() {
        let store = SecureTokenStore::new(Box::new(MemoryStorage::new()));
        let meta = sample_meta();

        store.store_rotation("refresh-1", &meta).unwrap();
        assert_eq!(store.refresh_token().unwrap(), Some("refresh-1".to_string()));
        assert_eq!(store.metadata().unwrap(), Some(meta));

        store.store_rotation("refresh-2", &sample_meta()).unwrap();
        assert_eq!(store.refresh_token().unwrap(), Some("refresh-2".to_string()));

        store.clear().unwrap();
        assert!(!store.has_refresh_token().unwrap());
        assert!(store.metadata().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_metadata_reads_as_none() {
        let storage = MemoryStorage::new();
        storage.set(StorageKeys::TOKEN_METADATA, "{not json").unwrap();
        let store = SecureTokenStore::new(Box::new(storage));

        assert!(store.metadata().unwrap().is_none());
    }

    #[test]
    fn test_metadata_uses_camel_case_keys() {
        let json = serde_json::to_value(sample_meta()).unwrap();
        assert!(json.get("accessExpiry").is_some());
        assert!(json.get("lastRefresh").is_some());
    }

    struct FailingDeletes;

    impl SecureStorage for FailingDeletes {
        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Ok(())
        }

        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Err(StorageError::Platform(format!("cannot delete {}", key)))
        }
    }

    #[test]
    fn test_clear_reports_first_failure() {
        let store = SecureTokenStore::new(Box::new(FailingDeletes));
        let err = store.clear().unwrap_err();
        assert_eq!(
            err,
            StorageError::Platform(format!("cannot delete {}", StorageKeys::REFRESH_TOKEN))
        );
    }
}
