//! Persisted wallet record
//!
//! A wallet is four independently stored string fields under one namespace:
//!
//! | Field       | Contents                     | Encoding            |
//! |-------------|------------------------------|---------------------|
//! | `encrypted` | mnemonic ciphertext          | lowercase hex       |
//! | `salt`      | key-derivation salt          | hex, 32 bytes       |
//! | `iv`        | cipher nonce                 | hex, 12 bytes       |
//! | `address`   | public wallet identifier     | plain string        |

use crate::crypto::{CryptoError, NONCE_LEN, SALT_LEN};

/// One of the four stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Encrypted,
    Salt,
    Iv,
    Address,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Encrypted, Field::Salt, Field::Iv, Field::Address];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encrypted => "encrypted",
            Self::Salt => "salt",
            Self::Iv => "iv",
            Self::Address => "address",
        }
    }

    /// Storage key for this field inside `namespace`.
    pub fn key(self, namespace: &str) -> String {
        format!("{}.{}", namespace, self.as_str())
    }
}

/// Encrypted mnemonic plus everything needed to decrypt it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub ciphertext: Vec<u8>,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub address: String,
}

/// Hex-encoded form of an [`EncryptedRecord`], as written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFields {
    pub encrypted: String,
    pub salt: String,
    pub iv: String,
    pub address: String,
}

impl StoredFields {
    /// Value for `field`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Encrypted => &self.encrypted,
            Field::Salt => &self.salt,
            Field::Iv => &self.iv,
            Field::Address => &self.address,
        }
    }
}

impl EncryptedRecord {
    pub fn to_fields(&self) -> StoredFields {
        StoredFields {
            encrypted: hex::encode(&self.ciphertext),
            salt: hex::encode(self.salt),
            iv: hex::encode(self.nonce),
            address: self.address.clone(),
        }
    }

    /// Decode stored fields. Never panics on malformed input.
    pub fn from_fields(fields: &StoredFields) -> Result<Self, CryptoError> {
        let ciphertext = decode_hex("encrypted", &fields.encrypted)?;
        let salt = decode_fixed::<SALT_LEN>("salt", &fields.salt)?;
        let nonce = decode_fixed::<NONCE_LEN>("iv", &fields.iv)?;

        Ok(Self {
            ciphertext,
            salt,
            nonce,
            address: fields.address.clone(),
        })
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(value.trim()).map_err(|e| CryptoError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], CryptoError> {
    let bytes = decode_hex(field, value)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}
