//! Key protection service
//!
//! [`KeyProtectionService`] is the only entry point the unlock flow needs.
//! It composes a [`SecureStorage`] backend, a [`KeyDerivation`] and a
//! [`MnemonicCipher`], all injected at construction, and turns every
//! lower-level failure into a [`VaultError`].
//!
//! # Flow
//!
//! ```text
//! store:    password, salt ──kdf──▶ key ──cipher(mnemonic, nonce)──▶ {encrypted, salt, iv, address}
//! retrieve: {encrypted, salt, iv} + password ──kdf──▶ key ──cipher──▶ bytes ──bip39 check──▶ mnemonic
//! ```
//!
//! store / retrieve / delete / change_password on one wallet id are
//! serialised by a per-wallet async lock shared by every service created via
//! [`KeyProtectionService::for_wallet`]. Services built separately share
//! locks only when handed the same [`WalletLocks`] through
//! [`KeyProtectionService::with_locks`].
//!
//! Every successful store or delete also updates the [`WalletIndex`], which
//! backs [`list_wallets`](KeyProtectionService::list_wallets) and the
//! current-wallet selection.

use crate::cipher::{Aes256GcmCipher, MnemonicCipher};
use crate::crypto::{generate_nonce, generate_salt, CryptoError, DerivedKey, SALT_LEN};
use crate::error::{codes, Result, VaultError};
use crate::index::{self, WalletEntry, WalletIndex, INDEX_KEY};
use crate::kdf::{Argon2Kdf, KdfParams, KeyDerivation};
use crate::password::{self, MIN_PASSWORD_LEN};
use crate::record::{EncryptedRecord, Field, StoredFields};
use crate::seed::{self, WordCount};
use crate::storage::{SecureStorage, SecurityTier, StorageError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

/// Wallet namespace used when none is configured.
pub const DEFAULT_WALLET_ID: &str = "default";

// Ciphertext goes last: a reader never sees a new ciphertext paired with an old salt.
const WRITE_ORDER: [Field; 4] = [Field::Salt, Field::Iv, Field::Address, Field::Encrypted];

/// Construction options for [`KeyProtectionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Namespace for the four stored fields
    pub wallet_id: String,
    /// Minimum password length in characters; values below 8 are raised to 8
    pub min_password_len: usize,
    /// Permit a backend whose tier is [`SecurityTier::Untrusted`]
    pub allow_untrusted: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            wallet_id: DEFAULT_WALLET_ID.to_string(),
            min_password_len: MIN_PASSWORD_LEN,
            allow_untrusted: false,
        }
    }
}

/// Per-wallet async locks, plus one for the wallet index.
///
/// A wallet lock may be held while taking the index lock, never the reverse.
#[derive(Debug, Clone, Default)]
pub struct WalletLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    index: Arc<tokio::sync::Mutex<()>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding `wallet_id`. The same id always maps to the same lock.
    pub fn lock_for(&self, wallet_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(map.entry(wallet_id.to_string()).or_default())
    }

    /// Lock guarding the wallet index.
    pub fn index_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.index)
    }
}

#[derive(Clone)]
pub struct KeyProtectionService {
    storage: Arc<dyn SecureStorage>,
    kdf: Arc<dyn KeyDerivation>,
    cipher: Arc<dyn MnemonicCipher>,
    locks: WalletLocks,
    wallet_id: String,
    min_password_len: usize,
}

impl fmt::Debug for KeyProtectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProtectionService")
            .field("wallet_id", &self.wallet_id)
            .field("storage", &self.storage.name())
            .field("tier", &self.storage.security_tier())
            .field("kdf", &self.kdf.name())
            .field("cipher", &self.cipher.name())
            .finish()
    }
}

impl KeyProtectionService {
    /// Build a service over injected components.
    ///
    /// Fails with a wallet error if the backend is untrusted and
    /// `options.allow_untrusted` is not set, or if the wallet id is empty.
    ///
    /// The service gets its own [`WalletLocks`]. Another service built over
    /// the same storage does not wait on it unless both are given shared
    /// locks with [`with_locks`](Self::with_locks).
    pub fn new(
        storage: Arc<dyn SecureStorage>,
        kdf: Arc<dyn KeyDerivation>,
        cipher: Arc<dyn MnemonicCipher>,
        options: ServiceOptions,
    ) -> Result<Self> {
        check_wallet_id(&options.wallet_id)?;

        let tier = storage.security_tier();
        if tier == SecurityTier::Untrusted {
            if !options.allow_untrusted {
                return Err(VaultError::wallet(
                    codes::UNTRUSTED_STORAGE_REFUSED,
                    format!(
                        "storage backend '{}' is not encrypted at rest; enable allow_untrusted to use it",
                        storage.name()
                    ),
                ));
            }
            log::warn!(
                "Using untrusted storage backend '{}': wallet data is readable by anyone with file access",
                storage.name()
            );
        }

        log::debug!(
            "Key protection ready: wallet={} storage={} ({}) kdf={} cipher={}",
            options.wallet_id,
            storage.name(),
            tier,
            kdf.name(),
            cipher.name()
        );

        Ok(Self {
            storage,
            kdf,
            cipher,
            locks: WalletLocks::new(),
            wallet_id: options.wallet_id,
            min_password_len: options.min_password_len.max(MIN_PASSWORD_LEN),
        })
    }

    /// Argon2id (default costs) and AES-256-GCM over `storage`.
    pub fn with_defaults(storage: Arc<dyn SecureStorage>, options: ServiceOptions) -> Result<Self> {
        let kdf = Argon2Kdf::new(KdfParams::default()).map_err(|e| {
            VaultError::crypto(codes::KEY_DERIVATION_FAILED, "invalid Argon2 parameters").with_source(e)
        })?;
        Self::new(storage, Arc::new(kdf), Arc::new(Aes256GcmCipher), options)
    }

    /// Replace this service's locks with `locks`, typically taken from
    /// another service over the same storage.
    pub fn with_locks(mut self, locks: WalletLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &WalletLocks {
        &self.locks
    }

    /// Same storage, KDF, cipher and locks, addressing another wallet.
    pub fn for_wallet(&self, wallet_id: &str) -> Result<Self> {
        check_wallet_id(wallet_id)?;
        Ok(Self {
            wallet_id: wallet_id.to_string(),
            ..self.clone()
        })
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn security_tier(&self) -> SecurityTier {
        self.storage.security_tier()
    }

    /// Generate a 12-word mnemonic.
    pub fn generate_mnemonic(&self) -> Result<Zeroizing<String>> {
        self.generate_mnemonic_with(WordCount::Twelve)
    }

    pub fn generate_mnemonic_with(&self, words: WordCount) -> Result<Zeroizing<String>> {
        seed::generate_mnemonic(words).map_err(|e| {
            VaultError::crypto(codes::MNEMONIC_GENERATION_FAILED, "could not generate mnemonic")
                .with_source(e)
        })
    }

    /// Whether `phrase` is a valid 12- or 24-word mnemonic.
    pub fn validate_mnemonic(&self, phrase: &str) -> bool {
        seed::validate_mnemonic(phrase)
    }

    /// Encrypt `mnemonic` under `password` and persist it with `address`.
    ///
    /// Input is validated before any storage access, so a rejected call
    /// leaves storage untouched. A record already stored under this wallet id
    /// is read first and put back if the overwrite fails part way.
    pub async fn store(&self, mnemonic: &str, password: &str, address: &str) -> Result<()> {
        self.check_password(password)?;
        let phrase = canonical_phrase(mnemonic)?;

        let _guard = self.locks.lock_for(&self.wallet_id).lock_owned().await;
        let previous = self.read_fields().await?;
        self.write_record(&phrase, password, address, previous.as_ref()).await?;
        let now = index::unix_now();
        self.update_index(|wallets| {
            wallets.upsert(&self.wallet_id, address, now);
            true
        })
        .await;

        log::info!(
            "Wallet '{}' stored ({} storage, {}, {})",
            self.wallet_id,
            self.storage.name(),
            self.kdf.name(),
            self.cipher.name()
        );
        Ok(())
    }

    /// Decrypt the stored mnemonic.
    ///
    /// A missing field is a wallet error; anything that goes wrong after the
    /// fields are read is reported as a wrong password.
    pub async fn retrieve(&self, password: &str) -> Result<Zeroizing<String>> {
        let _guard = self.locks.lock_for(&self.wallet_id).lock_owned().await;

        let fields = self.read_fields().await?.ok_or_else(no_wallet)?;
        let phrase = self.open_record(&fields, password).await?;

        log::debug!("Wallet '{}' unlocked", self.wallet_id);
        Ok(phrase)
    }

    /// True iff a ciphertext is stored. Storage faults read as `false`.
    pub async fn has_wallet(&self) -> bool {
        match self.storage.get(&Field::Encrypted.key(&self.wallet_id)).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                log::warn!("Wallet presence check failed for '{}': {}", self.wallet_id, e);
                false
            }
        }
    }

    /// The stored address, without touching the secret fields.
    pub async fn stored_address(&self) -> Result<Option<String>> {
        self.storage
            .get(&Field::Address.key(&self.wallet_id))
            .await
            .map_err(|e| read_failed(Field::Address, e))
    }

    /// Remove all four fields and drop the wallet from the index.
    ///
    /// All deletions are attempted even when some fail. Deleting a wallet
    /// that does not exist succeeds.
    pub async fn delete_wallet(&self) -> Result<()> {
        let _guard = self.locks.lock_for(&self.wallet_id).lock_owned().await;
        self.delete_fields().await?;
        self.update_index(|wallets| wallets.remove(&self.wallet_id).is_some()).await;
        Ok(())
    }

    async fn delete_fields(&self) -> Result<()> {
        let [k_enc, k_salt, k_iv, k_addr] = Field::ALL.map(|f| f.key(&self.wallet_id));
        let (r_enc, r_salt, r_iv, r_addr) = tokio::join!(
            self.storage.delete(&k_enc),
            self.storage.delete(&k_salt),
            self.storage.delete(&k_iv),
            self.storage.delete(&k_addr),
        );

        let mut failures: Vec<(Field, StorageError)> = Field::ALL
            .into_iter()
            .zip([r_enc, r_salt, r_iv, r_addr])
            .filter_map(|(field, result)| result.err().map(|e| (field, e)))
            .collect();

        if failures.is_empty() {
            log::info!("Wallet '{}' deleted", self.wallet_id);
            return Ok(());
        }

        for (field, e) in &failures {
            log::error!("Deleting {} of wallet '{}' failed: {}", field.as_str(), self.wallet_id, e);
        }
        let count = failures.len();
        let (field, first) = failures.swap_remove(0);
        Err(VaultError::wallet(
            codes::STORAGE_DELETE_FAILED,
            format!(
                "failed to delete {} of {} wallet fields (first: {})",
                count,
                Field::ALL.len(),
                field.as_str()
            ),
        )
        .with_source(first))
    }

    /// Re-encrypt the stored mnemonic under `new_password` with a fresh salt and nonce.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        self.check_password(new_password)?;

        let _guard = self.locks.lock_for(&self.wallet_id).lock_owned().await;
        let fields = self.read_fields().await?.ok_or_else(no_wallet)?;
        let phrase = self.open_record(&fields, old_password).await?;
        self.write_record(&phrase, new_password, &fields.address, Some(&fields))
            .await?;

        log::info!("Password changed for wallet '{}'", self.wallet_id);
        Ok(())
    }

    /// Every wallet in the index, oldest first.
    pub async fn list_wallets(&self) -> Result<Vec<WalletEntry>> {
        let lock = self.locks.index_lock();
        let _guard = lock.lock().await;
        Ok(self.load_index().await?.wallets)
    }

    /// The wallet id selected as current, if any wallet is stored.
    pub async fn current_wallet(&self) -> Result<Option<String>> {
        let lock = self.locks.index_lock();
        let _guard = lock.lock().await;
        Ok(self.load_index().await?.current)
    }

    /// Select `wallet_id` as current. It must be in the index.
    pub async fn set_current_wallet(&self, wallet_id: &str) -> Result<()> {
        check_wallet_id(wallet_id)?;

        let lock = self.locks.index_lock();
        let _guard = lock.lock().await;
        let mut index = self.load_index().await?;
        if !index.contains(wallet_id) {
            return Err(VaultError::wallet(
                codes::WALLET_NOT_FOUND,
                format!("no wallet stored as '{}'", wallet_id),
            ));
        }
        index.current = Some(wallet_id.to_string());
        self.save_index(&index).await?;

        log::info!("Current wallet is now '{}'", wallet_id);
        Ok(())
    }

    /// Delete every indexed wallet, and this service's own wallet, then the
    /// index itself.
    ///
    /// Every wallet is attempted even when some fail; the index is only
    /// removed once all of them are gone.
    pub async fn delete_all_wallets(&self) -> Result<()> {
        let mut ids = {
            let lock = self.locks.index_lock();
            let _guard = lock.lock().await;
            match self.load_index().await {
                Ok(index) => index.ids(),
                Err(e) => {
                    log::warn!("Wallet index unreadable, deleting '{}' only: {}", self.wallet_id, e);
                    Vec::new()
                }
            }
        };
        if !ids.contains(&self.wallet_id) {
            ids.push(self.wallet_id.clone());
        }

        let mut failures = Vec::new();
        for id in &ids {
            let result = match self.for_wallet(id) {
                Ok(wallet) => wallet.delete_wallet().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failures.push((id.clone(), e));
            }
        }

        if failures.is_empty() {
            let lock = self.locks.index_lock();
            let _guard = lock.lock().await;
            self.storage.delete(INDEX_KEY).await.map_err(|e| {
                VaultError::wallet(codes::STORAGE_DELETE_FAILED, "failed to delete wallet index")
                    .with_source(e)
            })?;
            log::info!("All {} wallet(s) deleted", ids.len());
            return Ok(());
        }

        let count = failures.len();
        let (id, first) = failures.swap_remove(0);
        Err(VaultError::wallet(
            codes::STORAGE_DELETE_FAILED,
            format!("failed to delete {} of {} wallets (first: {})", count, ids.len(), id),
        )
        .with_source(first))
    }

    fn check_password(&self, password: &str) -> Result<()> {
        if !password::meets_min_length(password, self.min_password_len) {
            return Err(VaultError::crypto(
                codes::PASSWORD_TOO_SHORT,
                format!("password must be at least {} characters", self.min_password_len),
            ));
        }

        let assessment = password::assess(password);
        if !assessment.strength.is_recommended() {
            log::warn!(
                "Wallet '{}' is protected by a weak password (~{:.0} bits): {}",
                self.wallet_id,
                assessment.entropy_bits,
                assessment.warnings.join(", ")
            );
        }
        Ok(())
    }

    async fn derive_key(&self, password: &str, salt: [u8; SALT_LEN]) -> std::result::Result<DerivedKey, CryptoError> {
        let kdf = Arc::clone(&self.kdf);
        let password = Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || kdf.derive(&password, &salt))
            .await
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?
    }

    async fn write_record(
        &self,
        phrase: &str,
        password: &str,
        address: &str,
        previous: Option<&StoredFields>,
    ) -> Result<()> {
        let salt = generate_salt();
        let nonce = generate_nonce();

        let key = self.derive_key(password, salt).await.map_err(|e| {
            VaultError::crypto(codes::KEY_DERIVATION_FAILED, "key derivation failed").with_source(e)
        })?;
        let ciphertext = self
            .cipher
            .encrypt(phrase.as_bytes(), &key, &nonce)
            .map_err(|e| VaultError::crypto(codes::ENCRYPTION_FAILED, "encryption failed").with_source(e))?;

        let fields = EncryptedRecord {
            ciphertext,
            salt,
            nonce,
            address: address.to_string(),
        }
        .to_fields();

        for (written, field) in WRITE_ORDER.into_iter().enumerate() {
            if let Err(e) = self.storage.set(&field.key(&self.wallet_id), fields.get(field)).await {
                let replaced = &WRITE_ORDER[..written];
                match previous {
                    Some(previous) => self.restore_fields(replaced, previous).await,
                    None => self.discard_fields(replaced).await,
                }
                return Err(VaultError::wallet(
                    codes::STORAGE_WRITE_FAILED,
                    format!("failed to write wallet field '{}'", field.as_str()),
                )
                .with_source(e));
            }
        }
        Ok(())
    }

    /// Write back the fields of `previous` that a failed overwrite replaced.
    async fn restore_fields(&self, replaced: &[Field], previous: &StoredFields) {
        let mut restored = true;
        for &field in replaced {
            if let Err(e) = self.storage.set(&field.key(&self.wallet_id), previous.get(field)).await {
                restored = false;
                log::error!(
                    "Restoring {} of wallet '{}' failed: {}",
                    field.as_str(),
                    self.wallet_id,
                    e
                );
            }
        }
        if restored && !replaced.is_empty() {
            log::warn!("Write to wallet '{}' failed; previous record restored", self.wallet_id);
        }
    }

    /// With no previous record there is nothing to restore. The fields written
    /// so far are removed, along with any orphaned ciphertext, so the wallet
    /// reads as absent instead of undecryptable.
    async fn discard_fields(&self, replaced: &[Field]) {
        if replaced.is_empty() {
            return;
        }
        for field in replaced.iter().copied().chain([Field::Encrypted]) {
            if let Err(e) = self.storage.delete(&field.key(&self.wallet_id)).await {
                log::error!(
                    "Wallet '{}' left inconsistent after failed write ({}): {}",
                    self.wallet_id,
                    field.as_str(),
                    e
                );
            }
        }
    }

    /// Apply `change` to the index under the index lock. `change` returns
    /// whether anything changed. Failures are logged: the wallet record
    /// itself is already written or deleted at this point.
    async fn update_index<F>(&self, change: F)
    where
        F: FnOnce(&mut WalletIndex) -> bool,
    {
        let lock = self.locks.index_lock();
        let _guard = lock.lock().await;

        let result = match self.load_index().await {
            Ok(mut index) => {
                if change(&mut index) {
                    self.save_index(&index).await
                } else {
                    Ok(())
                }
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::warn!("Wallet index not updated for '{}': {}", self.wallet_id, e);
        }
    }

    async fn load_index(&self) -> Result<WalletIndex> {
        let json = self.storage.get(INDEX_KEY).await.map_err(|e| {
            VaultError::wallet(codes::STORAGE_READ_FAILED, "failed to read wallet index").with_source(e)
        })?;
        match json {
            Some(json) => WalletIndex::from_json(&json).map_err(|e| {
                VaultError::wallet(codes::STORAGE_READ_FAILED, "wallet index is unreadable").with_source(e)
            }),
            None => Ok(WalletIndex::new()),
        }
    }

    /// An empty index is removed rather than written.
    async fn save_index(&self, index: &WalletIndex) -> Result<()> {
        let result = if index.is_empty() {
            self.storage.delete(INDEX_KEY).await
        } else {
            let json = index.to_json().map_err(|e| {
                VaultError::wallet(codes::STORAGE_WRITE_FAILED, "failed to encode wallet index")
                    .with_source(e)
            })?;
            self.storage.set(INDEX_KEY, &json).await
        };
        result.map_err(|e| {
            VaultError::wallet(codes::STORAGE_WRITE_FAILED, "failed to write wallet index").with_source(e)
        })
    }

    async fn read_fields(&self) -> Result<Option<StoredFields>> {
        let [k_enc, k_salt, k_iv, k_addr] = Field::ALL.map(|f| f.key(&self.wallet_id));
        let (encrypted, salt, iv, address) = tokio::join!(
            self.storage.get(&k_enc),
            self.storage.get(&k_salt),
            self.storage.get(&k_iv),
            self.storage.get(&k_addr),
        );

        let encrypted = encrypted.map_err(|e| read_failed(Field::Encrypted, e))?;
        let salt = salt.map_err(|e| read_failed(Field::Salt, e))?;
        let iv = iv.map_err(|e| read_failed(Field::Iv, e))?;
        let address = address.map_err(|e| read_failed(Field::Address, e))?;

        Ok(match (encrypted, salt, iv, address) {
            (Some(encrypted), Some(salt), Some(iv), Some(address)) => Some(StoredFields {
                encrypted,
                salt,
                iv,
                address,
            }),
            _ => None,
        })
    }

    async fn open_record(&self, fields: &StoredFields, password: &str) -> Result<Zeroizing<String>> {
        let record = EncryptedRecord::from_fields(fields).map_err(auth_failed)?;
        let key = self.derive_key(password, record.salt).await.map_err(auth_failed)?;
        let plaintext = self
            .cipher
            .decrypt(&record.ciphertext, &key, &record.nonce)
            .map_err(auth_failed)?;

        let phrase = std::str::from_utf8(&plaintext).map_err(auth_failed)?;
        seed::parse_mnemonic(phrase).map_err(auth_failed)?;
        Ok(Zeroizing::new(phrase.to_string()))
    }
}

fn check_wallet_id(wallet_id: &str) -> Result<()> {
    if wallet_id.trim().is_empty() {
        return Err(VaultError::wallet(
            codes::INVALID_WALLET_ID,
            "wallet id must not be empty",
        ));
    }
    Ok(())
}

/// Validate and normalise whitespace. Only 12- and 24-word phrases are accepted.
fn canonical_phrase(mnemonic: &str) -> Result<Zeroizing<String>> {
    let parsed = seed::parse_mnemonic(mnemonic).map_err(|e| {
        VaultError::crypto(codes::INVALID_MNEMONIC, "not a valid recovery phrase").with_source(e)
    })?;
    WordCount::try_from(parsed.word_count()).map_err(|e| {
        VaultError::crypto(codes::INVALID_MNEMONIC, "recovery phrase must have 12 or 24 words")
            .with_source(e)
    })?;
    Ok(Zeroizing::new(parsed.to_string()))
}

fn no_wallet() -> VaultError {
    VaultError::wallet(codes::WALLET_NOT_FOUND, "no wallet stored")
}

fn read_failed(field: Field, e: StorageError) -> VaultError {
    VaultError::wallet(
        codes::STORAGE_READ_FAILED,
        format!("failed to read wallet field '{}'", field.as_str()),
    )
    .with_source(e)
}

fn auth_failed<E>(e: E) -> VaultError
where
    E: std::error::Error + Send + Sync + 'static,
{
    VaultError::authentication().with_source(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::XorStreamCipher;
    use crate::kdf::IteratedHashKdf;
    use crate::storage::{LocalStorage, MemoryStorage};

    const PHRASE: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";
    const ADDRESS: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn fast_kdf() -> Arc<dyn KeyDerivation> {
        Arc::new(
            Argon2Kdf::new(KdfParams {
                m_cost: 1024,
                t_cost: 1,
                p_cost: 1,
            })
            .unwrap(),
        )
    }

    fn service(storage: Arc<MemoryStorage>) -> KeyProtectionService {
        KeyProtectionService::new(storage, fast_kdf(), Arc::new(Aes256GcmCipher), ServiceOptions::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let svc = service(Arc::new(MemoryStorage::new()));
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        let phrase = svc.retrieve("correct-password-1").await.unwrap();
        assert_eq!(phrase.as_str(), PHRASE);
    }

    #[tokio::test]
    async fn test_whitespace_is_normalised() {
        let svc = service(Arc::new(MemoryStorage::new()));
        let messy = format!("  {}  \n", PHRASE.replace(' ', "   "));
        svc.store(&messy, "correct-password-1", ADDRESS).await.unwrap();

        assert_eq!(svc.retrieve("correct-password-1").await.unwrap().as_str(), PHRASE);
    }

    #[tokio::test]
    async fn test_fields_are_hex_and_sized() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        let salt = storage.get("default.salt").await.unwrap().unwrap();
        let iv = storage.get("default.iv").await.unwrap().unwrap();
        let encrypted = storage.get("default.encrypted").await.unwrap().unwrap();
        assert_eq!(hex::decode(salt).unwrap().len(), 32);
        assert_eq!(hex::decode(iv).unwrap().len(), 12);
        assert!(!encrypted.contains("legal"));
        assert_eq!(storage.get("default.address").await.unwrap().as_deref(), Some(ADDRESS));
        // Four fields plus the wallet index
        assert_eq!(storage.len().await, 5);
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_io() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());

        let err = svc.store(PHRASE, "short", ADDRESS).await.unwrap_err();
        assert!(err.is_crypto());
        assert_eq!(err.code(), codes::PASSWORD_TOO_SHORT);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_mnemonic_rejected_before_io() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());

        let err = svc
            .store("not a real phrase at all", "correct-password-1", ADDRESS)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_MNEMONIC);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_custom_min_length_applies() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = KeyProtectionService::new(
            storage,
            fast_kdf(),
            Arc::new(Aes256GcmCipher),
            ServiceOptions {
                min_password_len: 12,
                ..ServiceOptions::default()
            },
        )
        .unwrap();

        let err = svc.store(PHRASE, "elevenchars", ADDRESS).await.unwrap_err();
        assert_eq!(err.code(), codes::PASSWORD_TOO_SHORT);
        svc.store(PHRASE, "twelve-chars", ADDRESS).await.unwrap();
    }

    #[tokio::test]
    async fn test_xor_wrong_password_detected() {
        let svc = KeyProtectionService::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(IteratedHashKdf::sha256(1_000).unwrap()),
            Arc::new(XorStreamCipher),
            ServiceOptions::default(),
        )
        .unwrap();
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        assert_eq!(svc.retrieve("correct-password-1").await.unwrap().as_str(), PHRASE);
        let err = svc.retrieve("wrong-password").await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(err.message(), "password incorrect");
    }

    #[tokio::test]
    async fn test_corrupted_hex_is_authentication_error() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        storage.set("default.salt", "zz").await.unwrap();
        let err = svc.retrieve("correct-password-1").await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_partial_record_reads_as_missing() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        storage.delete("default.iv").await.unwrap();
        let err = svc.retrieve("correct-password-1").await.unwrap_err();
        assert!(err.is_wallet());
        assert_eq!(err.code(), codes::WALLET_NOT_FOUND);
        assert_eq!(err.message(), "no wallet stored");
    }

    #[tokio::test]
    async fn test_untrusted_backend_requires_opt_in() {
        let local: Arc<dyn SecureStorage> = Arc::new(LocalStorage::open_in_memory().unwrap());

        let err = KeyProtectionService::new(
            local.clone(),
            fast_kdf(),
            Arc::new(Aes256GcmCipher),
            ServiceOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), codes::UNTRUSTED_STORAGE_REFUSED);

        let svc = KeyProtectionService::new(
            local,
            fast_kdf(),
            Arc::new(Aes256GcmCipher),
            ServiceOptions {
                allow_untrusted: true,
                ..ServiceOptions::default()
            },
        )
        .unwrap();
        assert_eq!(svc.security_tier(), SecurityTier::Untrusted);
    }

    #[tokio::test]
    async fn test_wallets_are_namespaced() {
        let storage = Arc::new(MemoryStorage::new());
        let first = service(storage.clone());
        let second = first.for_wallet("savings").unwrap();

        first.store(PHRASE, "first-password", "5First").await.unwrap();
        assert!(!second.has_wallet().await);

        let other = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        second.store(other, "second-password", "5Second").await.unwrap();

        assert_eq!(first.retrieve("first-password").await.unwrap().as_str(), PHRASE);
        assert_eq!(second.retrieve("second-password").await.unwrap().as_str(), other);
        assert_eq!(second.stored_address().await.unwrap().as_deref(), Some("5Second"));
        assert!(first.for_wallet("  ").is_err());
    }

    #[test]
    fn test_same_wallet_same_lock() {
        let locks = WalletLocks::new();
        let a = locks.lock_for("w");
        let b = locks.lock_for("w");
        let c = locks.lock_for("other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_retrieve_waits_for_lock() {
        let svc = service(Arc::new(MemoryStorage::new()));
        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        let lock = svc.locks.lock_for(svc.wallet_id());
        let guard = lock.lock().await;

        let reader = svc.clone();
        let handle = tokio::spawn(async move { reader.retrieve("correct-password-1").await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        drop(guard);
        assert_eq!(handle.await.unwrap().unwrap().as_str(), PHRASE);
    }

    #[tokio::test]
    async fn test_shared_locks_across_services() {
        let storage = Arc::new(MemoryStorage::new());
        let writer = service(storage.clone());
        let reader = service(storage).with_locks(writer.locks().clone());
        writer.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();

        let lock = writer.locks().lock_for(DEFAULT_WALLET_ID);
        let guard = lock.lock().await;

        let handle = tokio::spawn(async move { reader.retrieve("correct-password-1").await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        drop(guard);
        assert_eq!(handle.await.unwrap().unwrap().as_str(), PHRASE);
    }

    #[tokio::test]
    async fn test_store_and_delete_maintain_index() {
        let storage = Arc::new(MemoryStorage::new());
        let first = service(storage.clone());
        let second = first.for_wallet("savings").unwrap();
        assert!(first.list_wallets().await.unwrap().is_empty());
        assert_eq!(first.current_wallet().await.unwrap(), None);

        first.store(PHRASE, "first-password", "5First").await.unwrap();
        second.store(PHRASE, "second-password", "5Second").await.unwrap();

        let wallets = first.list_wallets().await.unwrap();
        let ids: Vec<_> = wallets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["default", "savings"]);
        assert_eq!(wallets[1].address, "5Second");
        assert!(wallets[0].created_at > 0);
        assert_eq!(first.current_wallet().await.unwrap().as_deref(), Some("savings"));

        first.set_current_wallet("default").await.unwrap();
        assert_eq!(second.current_wallet().await.unwrap().as_deref(), Some("default"));

        let err = first.set_current_wallet("unknown").await.unwrap_err();
        assert_eq!(err.code(), codes::WALLET_NOT_FOUND);

        first.delete_wallet().await.unwrap();
        assert_eq!(first.current_wallet().await.unwrap().as_deref(), Some("savings"));
        second.delete_wallet().await.unwrap();
        assert!(first.list_wallets().await.unwrap().is_empty());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_index_does_not_block_store() {
        let storage = Arc::new(MemoryStorage::new());
        let svc = service(storage.clone());
        storage.set(INDEX_KEY, "{not json").await.unwrap();

        svc.store(PHRASE, "correct-password-1", ADDRESS).await.unwrap();
        assert_eq!(svc.retrieve("correct-password-1").await.unwrap().as_str(), PHRASE);

        let err = svc.list_wallets().await.unwrap_err();
        assert_eq!(err.code(), codes::STORAGE_READ_FAILED);

        svc.delete_all_wallets().await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let svc = service(Arc::new(MemoryStorage::new()));
        let debug = format!("{:?}", svc);
        assert!(debug.contains("aes-256-gcm"));
        assert!(debug.contains("memory"));
    }
}
