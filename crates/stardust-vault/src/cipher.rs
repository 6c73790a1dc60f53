//! Mnemonic encryption
//!
//! [`Aes256GcmCipher`] is the default: the nonce is part of the transform and
//! a wrong key or a flipped bit fails the tag check.
//!
//! [`XorStreamCipher`] reproduces the repeating-key XOR used by earlier
//! wallet builds. It never fails on a wrong key and ignores the nonce, so the
//! service must check that the decrypted bytes are a well-formed mnemonic.

use crate::crypto::{CryptoError, KEY_LEN, NONCE_LEN};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use zeroize::Zeroizing;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Reversible mnemonic transform keyed by a derived key.
pub trait MnemonicCipher: Send + Sync {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Whether `decrypt` detects a wrong key or tampered input on its own.
    fn is_authenticated(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// AES-256-GCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

impl MnemonicCipher for Aes256GcmCipher {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::InvalidLength {
                field: "ciphertext",
                expected: TAG_LEN,
                actual: ciphertext.len(),
            });
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| {
                CryptoError::DecryptionFailed("Invalid password or corrupted data".to_string())
            })
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }
}

/// Repeating-key XOR stream. Unauthenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorStreamCipher;

impl XorStreamCipher {
    fn apply(data: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
        data.iter()
            .zip(key.iter().cycle())
            .map(|(d, k)| d ^ k)
            .collect()
    }
}

impl MnemonicCipher for XorStreamCipher {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8; KEY_LEN],
        _nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(Self::apply(plaintext, key))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8; KEY_LEN],
        _nonce: &[u8; NONCE_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Ok(Zeroizing::new(Self::apply(ciphertext, key)))
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "xor-stream"
    }
}
