//! Error taxonomy for the vault boundary
//!
//! Every failure that leaves [`KeyProtectionService`](crate::KeyProtectionService)
//! is a [`VaultError`] of exactly one [`ErrorKind`]. Lower layers keep their own
//! error enums ([`StorageError`](crate::storage::StorageError),
//! [`CryptoError`](crate::crypto::CryptoError), [`SeedError`](crate::seed::SeedError));
//! the service re-wraps them and keeps the original as `source()`.
//!
//! | Kind           | Raised for                                  | UI text                 |
//! |----------------|---------------------------------------------|-------------------------|
//! | Wallet         | keystore / storage faults, missing wallet   | "wallet storage failed" |
//! | Authentication | wrong password, undecryptable record        | "password incorrect"    |
//! | Crypto         | short password, bad mnemonic, KDF faults    | generic failure         |
//! | Network        | reserved for RPC callers                    | generic failure         |
//! | Transaction    | reserved for RPC callers                    | generic failure         |

use std::fmt;
use thiserror::Error;

/// Boxed cause carried by a [`VaultError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used by the public service API.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Machine codes attached to [`VaultError`].
pub mod codes {
    pub const WALLET_NOT_FOUND: &str = "WALLET_NOT_FOUND";
    pub const STORAGE_READ_FAILED: &str = "STORAGE_READ_FAILED";
    pub const STORAGE_WRITE_FAILED: &str = "STORAGE_WRITE_FAILED";
    pub const STORAGE_DELETE_FAILED: &str = "STORAGE_DELETE_FAILED";
    pub const UNTRUSTED_STORAGE_REFUSED: &str = "UNTRUSTED_STORAGE_REFUSED";
    pub const INVALID_WALLET_ID: &str = "INVALID_WALLET_ID";
    pub const PASSWORD_INCORRECT: &str = "PASSWORD_INCORRECT";
    pub const PASSWORD_TOO_SHORT: &str = "PASSWORD_TOO_SHORT";
    pub const INVALID_MNEMONIC: &str = "INVALID_MNEMONIC";
    pub const KEY_DERIVATION_FAILED: &str = "KEY_DERIVATION_FAILED";
    pub const ENCRYPTION_FAILED: &str = "ENCRYPTION_FAILED";
    pub const MNEMONIC_GENERATION_FAILED: &str = "MNEMONIC_GENERATION_FAILED";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const TRANSACTION_ERROR: &str = "TRANSACTION_ERROR";
}

/// Default message for [`ErrorKind::Authentication`].
pub const PASSWORD_INCORRECT_MSG: &str = "password incorrect";

/// Failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Storage or keystore fault, or no wallet stored
    Wallet,
    /// Wrong password
    Authentication,
    /// Key derivation, encryption or input validation fault
    Crypto,
    /// Network fault (used by RPC callers)
    Network,
    /// Transaction fault (used by RPC callers)
    Transaction,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wallet => "WalletError",
            Self::Authentication => "AuthenticationError",
            Self::Crypto => "CryptoError",
            Self::Network => "NetworkError",
            Self::Transaction => "TransactionError",
        };
        f.write_str(name)
    }
}

/// The single error type surfaced by the vault.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct VaultError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl VaultError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn wallet(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Wallet, code, message)
    }

    /// Wrong password. Always carries the default message.
    pub fn authentication() -> Self {
        Self::new(
            ErrorKind::Authentication,
            codes::PASSWORD_INCORRECT,
            PASSWORD_INCORRECT_MSG,
        )
    }

    pub fn crypto(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Crypto, code, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, codes::NETWORK_ERROR, message)
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transaction, codes::TRANSACTION_ERROR, message)
    }

    /// Attach the lower-level cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_wallet(&self) -> bool {
        self.kind == ErrorKind::Wallet
    }

    pub fn is_crypto(&self) -> bool {
        self.kind == ErrorKind::Crypto
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Authentication => PASSWORD_INCORRECT_MSG,
            ErrorKind::Wallet => "wallet storage failed",
            ErrorKind::Crypto => "operation failed",
            ErrorKind::Network => "network unavailable",
            ErrorKind::Transaction => "transaction failed",
        }
    }
}
