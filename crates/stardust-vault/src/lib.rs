//! Stardust Vault
//!
//! Password-protected storage for a wallet's BIP-39 recovery phrase.
//!
//! # Scheme
//!
//! The phrase is encrypted under a key derived from the user's password and
//! persisted as four fields (`encrypted`, `salt`, `iv`, `address`) through a
//! pluggable [`SecureStorage`] backend. Defaults are Argon2id + AES-256-GCM;
//! an iterated SHA-256 KDF and an unauthenticated XOR stream cipher can be
//! selected for compatibility. The scheme is not recorded next to the data,
//! so a wallet must be opened with the same KDF and cipher it was stored with.
//!
//! Several wallets can share one backend under different ids; a small JSON
//! index lists them and remembers which one is current.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stardust_vault::{KeyProtectionService, OsKeystore, ServiceOptions};
//!
//! # async fn run() -> stardust_vault::Result<()> {
//! let vault = KeyProtectionService::with_defaults(
//!     Arc::new(OsKeystore::default()),
//!     ServiceOptions::default(),
//! )?;
//! let phrase = vault.generate_mnemonic()?;
//! vault.store(&phrase, "correct horse battery", "5F...").await?;
//! let unlocked = vault.retrieve("correct horse battery").await?;
//! assert_eq!(*unlocked, *phrase);
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod crypto;
pub mod error;
pub mod index;
pub mod kdf;
pub mod memory;
pub mod password;
pub mod record;
pub mod seed;
pub mod service;
pub mod storage;

pub use cipher::{Aes256GcmCipher, MnemonicCipher, XorStreamCipher};
pub use crypto::CryptoError;
pub use error::{codes, ErrorKind, Result, VaultError};
pub use index::{WalletEntry, WalletIndex};
pub use kdf::{Argon2Kdf, IteratedHashKdf, KdfParams, KeyDerivation, Sha256};
pub use seed::WordCount;
pub use service::{KeyProtectionService, ServiceOptions, WalletLocks, DEFAULT_WALLET_ID};
pub use storage::{LocalStorage, MemoryStorage, OsKeystore, SecureStorage, SecurityTier, StorageError};
