//! Secure key/value storage
//!
//! Wallet fields are persisted through [`SecureStorage`], an async string
//! key/value interface with three backends:
//!
//! | Backend          | Tier        | Where the bytes live                          |
//! |------------------|-------------|-----------------------------------------------|
//! | [`OsKeystore`]   | Trusted     | OS credential store (Keychain, Secret Service, Credential Manager) |
//! | [`LocalStorage`] | Untrusted   | SQLite file, readable by anything with file access |
//! | [`MemoryStorage`]| Ephemeral   | process memory, gone on exit                  |
//!
//! `LocalStorage` is the durable fallback for environments without an OS
//! keystore. It is not a drop-in equivalent: the record it holds is only as
//! strong as the wallet password, so callers must opt in to it explicitly
//! (see [`ServiceOptions::allow_untrusted`](crate::ServiceOptions)).
//!
//! All backends report a missing key as `Ok(None)` and treat deleting a
//! missing key as success.

mod local;
mod memory;
mod os_keystore;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use os_keystore::{OsKeystore, DEFAULT_SERVICE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("OS keystore error: {0}")]
    Keystore(#[from] keyring::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Storage lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Backend(String),
}

/// Confidentiality class of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityTier {
    /// Isolated per-application OS keystore
    Trusted,
    /// Durable but readable by other code with the same file access
    Untrusted,
    /// In-process only, lost on exit
    Ephemeral,
}

impl SecurityTier {
    /// Whether data at rest is protected by the platform.
    pub fn is_platform_protected(self) -> bool {
        matches!(self, Self::Trusted)
    }
}

impl fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trusted => "trusted",
            Self::Untrusted => "untrusted",
            Self::Ephemeral => "ephemeral",
        })
    }
}

/// Async string key/value store.
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read `key`; `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`; succeeds if already absent.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn security_tier(&self) -> SecurityTier;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_trusted_is_platform_protected() {
        assert!(SecurityTier::Trusted.is_platform_protected());
        assert!(!SecurityTier::Untrusted.is_platform_protected());
        assert!(!SecurityTier::Ephemeral.is_platform_protected());
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(SecurityTier::Untrusted.to_string(), "untrusted");
    }
}
