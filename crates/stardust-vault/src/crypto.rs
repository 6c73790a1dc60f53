//! Shared cryptographic primitives
//!
//! Sizes, the derived-key type, and fresh salt/nonce generation used by
//! [`kdf`](crate::kdf) and [`cipher`](crate::cipher).
//!
//! # Security Notes
//!
//! - Salts and nonces come straight from the OS CSPRNG
//! - A new salt and nonce are drawn for every stored record
//! - Derived keys live in [`Zeroizing`] buffers and are wiped on drop

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Salt length for key derivation (256 bits)
pub const SALT_LEN: usize = 32;

/// Nonce length for the mnemonic cipher (96 bits, AES-GCM standard)
pub const NONCE_LEN: usize = 12;

/// Derived key length (256 bits, AES-256)
pub const KEY_LEN: usize = 32;

/// Symmetric key material, zeroed when dropped.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid {field}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
}

/// Draw a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Draw a fresh random nonce.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_salts_are_unique() {
        let salts: HashSet<[u8; SALT_LEN]> = (0..64).map(|_| generate_salt()).collect();
        assert_eq!(salts.len(), 64);
    }

    #[test]
    fn test_nonces_are_unique() {
        let nonces: HashSet<[u8; NONCE_LEN]> = (0..64).map(|_| generate_nonce()).collect();
        assert_eq!(nonces.len(), 64);
    }

    #[test]
    fn test_salt_uses_full_byte_range() {
        // 32 salts x 32 bytes: the chance that no byte ever exceeds 0x7F is 2^-1024.
        let saw_high_byte = (0..32)
            .flat_map(|_| generate_salt())
            .any(|b| b >= 0x80);
        assert!(saw_high_byte, "salt bytes look restricted to 7 bits");
    }
}
