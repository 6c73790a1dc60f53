//! OS keystore backend.
//!
//! Each storage key becomes one credential `(service, key)` in the platform
//! store: Keychain on macOS/iOS, Credential Manager on Windows, Secret
//! Service or keyutils on Linux. `keyring` calls block, so they run on the
//! blocking thread pool.

use super::{SecureStorage, SecurityTier, StorageError};
use async_trait::async_trait;
use keyring::Entry;
use zeroize::Zeroizing;

/// Default credential service name.
pub const DEFAULT_SERVICE: &str = "stardust-vault";

#[derive(Debug, Clone)]
pub struct OsKeystore {
    service: String,
}

impl OsKeystore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            op(entry).map_err(StorageError::from)
        })
        .await?
    }
}

impl Default for OsKeystore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[async_trait]
impl SecureStorage for OsKeystore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = Zeroizing::new(value.to_string());
        self.with_entry(key, move |entry| entry.set_password(&value))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }

    fn security_tier(&self) -> SecurityTier {
        SecurityTier::Trusted
    }

    fn name(&self) -> &'static str {
        "os-keystore"
    }
}
