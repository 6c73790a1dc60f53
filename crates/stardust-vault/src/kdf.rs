//! Password-based key derivation
//!
//! Two derivations are available behind [`KeyDerivation`]:
//!
//! - [`Argon2Kdf`]: Argon2id, memory-hard. The default.
//! - [`IteratedHashKdf`]: `H(password || salt)` re-hashed `rounds` times.
//!   Kept for wallets created by older clients; it is cheap to attack on GPUs.
//!
//! Both are pure: the salt is always supplied by the caller, so the salt stored
//! next to a ciphertext reproduces the same key at unlock time.

use crate::crypto::{CryptoError, DerivedKey, KEY_LEN};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256 as Sha256Hasher};
use zeroize::Zeroizing;

/// Lowest accepted round count for [`IteratedHashKdf`].
pub const MIN_HASH_ROUNDS: u32 = 1_000;

/// Default round count for [`IteratedHashKdf`].
pub const DEFAULT_HASH_ROUNDS: u32 = 10_000;

/// Derives a symmetric key from a password and a salt.
pub trait KeyDerivation: Send + Sync {
    /// Same `(password, salt)` always yields the same key.
    fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError>;

    /// Short identifier used in logs and config.
    fn name(&self) -> &'static str;
}

/// Argon2id cost parameters.
///
/// Defaults follow the OWASP 2024 guidance: 64 MiB, 3 passes, 4 lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Number of passes
    pub t_cost: u32,
    /// Degree of parallelism
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

/// Argon2id key derivation.
#[derive(Debug, Clone)]
pub struct Argon2Kdf {
    params: Params,
}

impl Argon2Kdf {
    /// Build with explicit cost parameters. Rejects parameters Argon2 cannot run with.
    pub fn new(params: KdfParams) -> Result<Self, CryptoError> {
        let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        Ok(Self { params })
    }
}

impl KeyDerivation for Argon2Kdf {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(key)
    }

    fn name(&self) -> &'static str {
        "argon2id"
    }
}

/// A fixed-output cryptographic hash.
pub trait HashPrimitive: Send + Sync {
    fn digest(&self, data: &[u8]) -> [u8; KEY_LEN];
}

/// SHA-256 via the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

impl HashPrimitive for Sha256 {
    fn digest(&self, data: &[u8]) -> [u8; KEY_LEN] {
        Sha256Hasher::digest(data).into()
    }
}

/// Iterated single-hash derivation.
///
/// `key = H^rounds(H(password || salt))`
#[derive(Debug, Clone)]
pub struct IteratedHashKdf<H = Sha256> {
    hash: H,
    rounds: u32,
}

impl<H: HashPrimitive> IteratedHashKdf<H> {
    /// `rounds` must be at least [`MIN_HASH_ROUNDS`].
    pub fn new(hash: H, rounds: u32) -> Result<Self, CryptoError> {
        if rounds < MIN_HASH_ROUNDS {
            return Err(CryptoError::KeyDerivationFailed(format!(
                "round count {} is below the minimum of {}",
                rounds, MIN_HASH_ROUNDS
            )));
        }
        Ok(Self { hash, rounds })
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl IteratedHashKdf<Sha256> {
    pub fn sha256(rounds: u32) -> Result<Self, CryptoError> {
        Self::new(Sha256, rounds)
    }
}

impl<H: HashPrimitive> KeyDerivation for IteratedHashKdf<H> {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError> {
        let mut input = Zeroizing::new(Vec::with_capacity(password.len() + salt.len()));
        input.extend_from_slice(password.as_bytes());
        input.extend_from_slice(salt);

        let mut key = Zeroizing::new(self.hash.digest(&input));
        for _ in 0..self.rounds {
            *key = self.hash.digest(&key[..]);
        }

        Ok(key)
    }

    fn name(&self) -> &'static str {
        "iterated-sha256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small Argon2 costs so the suite stays fast.
    fn fast_argon2() -> Argon2Kdf {
        Argon2Kdf::new(KdfParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_argon2_deterministic() {
        let kdf = fast_argon2();
        let salt = [7u8; 32];

        let k1 = kdf.derive("correct-password-1", &salt).unwrap();
        let k2 = kdf.derive("correct-password-1", &salt).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn test_argon2_salt_and_password_matter() {
        let kdf = fast_argon2();
        let base = kdf.derive("correct-password-1", &[1u8; 32]).unwrap();
        let other_salt = kdf.derive("correct-password-1", &[2u8; 32]).unwrap();
        let other_pw = kdf.derive("correct-password-2", &[1u8; 32]).unwrap();

        assert_ne!(*base, *other_salt);
        assert_ne!(*base, *other_pw);
    }

    #[test]
    fn test_argon2_rejects_bad_params() {
        // Argon2 requires at least 8 KiB per lane.
        let result = Argon2Kdf::new(KdfParams {
            m_cost: 1,
            t_cost: 1,
            p_cost: 4,
        });
        assert!(matches!(result, Err(CryptoError::KeyDerivationFailed(_))));
    }

    #[test]
    fn test_iterated_hash_deterministic() {
        let kdf = IteratedHashKdf::sha256(MIN_HASH_ROUNDS).unwrap();
        let salt = [9u8; 32];

        let k1 = kdf.derive("hunter2hunter2", &salt).unwrap();
        let k2 = kdf.derive("hunter2hunter2", &salt).unwrap();
        assert_eq!(*k1, *k2);

        let k3 = kdf.derive("hunter2hunter3", &salt).unwrap();
        assert_ne!(*k1, *k3);
    }

    #[test]
    fn test_iterated_hash_matches_manual_computation() {
        let kdf = IteratedHashKdf::sha256(MIN_HASH_ROUNDS).unwrap();
        let salt = [0xABu8; 32];

        let mut expected: [u8; 32] = Sha256Hasher::digest([b"password".as_slice(), &salt[..]].concat()).into();
        for _ in 0..MIN_HASH_ROUNDS {
            expected = Sha256Hasher::digest(expected).into();
        }

        let key = kdf.derive("password", &salt).unwrap();
        assert_eq!(*key, expected);
    }

    #[test]
    fn test_iterated_hash_round_count_matters() {
        let salt = [3u8; 32];
        let a = IteratedHashKdf::sha256(1_000).unwrap().derive("pw-pw-pw-pw", &salt).unwrap();
        let b = IteratedHashKdf::sha256(1_001).unwrap().derive("pw-pw-pw-pw", &salt).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_iterated_hash_rejects_low_rounds() {
        assert!(IteratedHashKdf::sha256(999).is_err());
        assert!(IteratedHashKdf::sha256(0).is_err());
    }

    #[test]
    fn test_custom_hash_primitive() {
        struct XorFold;
        impl HashPrimitive for XorFold {
            fn digest(&self, data: &[u8]) -> [u8; KEY_LEN] {
                let mut out = [0u8; KEY_LEN];
                for (i, b) in data.iter().enumerate() {
                    out[i % KEY_LEN] ^= b.wrapping_add(1);
                }
                out
            }
        }

        let kdf = IteratedHashKdf::new(XorFold, MIN_HASH_ROUNDS).unwrap();
        let a = kdf.derive("password", &[1u8; 32]).unwrap();
        let b = kdf.derive("password", &[1u8; 32]).unwrap();
        assert_eq!(*a, *b);
    }
}
