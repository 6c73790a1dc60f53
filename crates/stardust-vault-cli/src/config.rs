//! CLI configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageSection,

    /// Wallet namespace and password policy
    #[serde(default)]
    pub wallet: WalletSection,

    /// Key derivation
    #[serde(default)]
    pub kdf: KdfSection,

    /// Mnemonic cipher
    #[serde(default)]
    pub cipher: CipherSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    OsKeystore,
    Local,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfAlgorithm {
    Argon2id,
    IteratedSha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherAlgorithm {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    XorStream,
}

/// Storage backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// "os-keystore", "local" or "memory"
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Credential service name for the OS keystore
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory holding the local SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Accept a backend that is not encrypted at rest
    #[serde(default)]
    pub allow_untrusted: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            service_name: default_service_name(),
            data_dir: default_data_dir(),
            allow_untrusted: false,
        }
    }
}

/// Wallet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSection {
    /// Namespace for the stored fields
    #[serde(default = "default_wallet_id")]
    pub id: String,

    /// Minimum password length (never below 8)
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            id: default_wallet_id(),
            min_password_len: default_min_password_len(),
        }
    }
}

/// Key derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfSection {
    #[serde(default = "default_kdf")]
    pub algorithm: KdfAlgorithm,

    /// Argon2 memory cost in KiB
    #[serde(default = "default_m_cost")]
    pub m_cost: u32,

    /// Argon2 iterations
    #[serde(default = "default_t_cost")]
    pub t_cost: u32,

    /// Argon2 lanes
    #[serde(default = "default_p_cost")]
    pub p_cost: u32,

    /// Iterated hash rounds
    #[serde(default = "default_rounds")]
    pub rounds: u32,
}

impl Default for KdfSection {
    fn default() -> Self {
        Self {
            algorithm: default_kdf(),
            m_cost: default_m_cost(),
            t_cost: default_t_cost(),
            p_cost: default_p_cost(),
            rounds: default_rounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherSection {
    #[serde(default = "default_cipher")]
    pub algorithm: CipherAlgorithm,
}

impl Default for CipherSection {
    fn default() -> Self {
        Self {
            algorithm: default_cipher(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_backend() -> StorageBackend {
    StorageBackend::OsKeystore
}

fn default_service_name() -> String {
    stardust_vault::storage::DEFAULT_SERVICE.to_string()
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".stardust-vault"),
        None => PathBuf::from(".stardust-vault"),
    }
}

fn default_wallet_id() -> String {
    stardust_vault::DEFAULT_WALLET_ID.to_string()
}

fn default_min_password_len() -> usize {
    stardust_vault::password::MIN_PASSWORD_LEN
}

fn default_kdf() -> KdfAlgorithm {
    KdfAlgorithm::Argon2id
}

fn default_m_cost() -> u32 {
    stardust_vault::KdfParams::default().m_cost
}

fn default_t_cost() -> u32 {
    stardust_vault::KdfParams::default().t_cost
}

fn default_p_cost() -> u32 {
    stardust_vault::KdfParams::default().p_cost
}

fn default_rounds() -> u32 {
    stardust_vault::kdf::DEFAULT_HASH_ROUNDS
}

fn default_cipher() -> CipherAlgorithm {
    CipherAlgorithm::Aes256Gcm
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ============================================================================
// Enum parsing (environment overrides)
// ============================================================================

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "os-keystore" | "keystore" => Ok(Self::OsKeystore),
            "local" | "sqlite" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown storage backend: {}", other),
        }
    }
}

impl FromStr for KdfAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2id" | "argon2" => Ok(Self::Argon2id),
            "iterated-sha256" => Ok(Self::IteratedSha256),
            other => anyhow::bail!("unknown kdf algorithm: {}", other),
        }
    }
}

impl FromStr for CipherAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aes-256-gcm" | "aes-gcm" => Ok(Self::Aes256Gcm),
            "xor-stream" | "xor" => Ok(Self::XorStream),
            other => anyhow::bail!("unknown cipher algorithm: {}", other),
        }
    }
}

/// Boolean environment value, case-insensitive.
fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true or false, got: {}", other),
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OsKeystore => "os-keystore",
            Self::Local => "local",
            Self::Memory => "memory",
        })
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Argon2id => "argon2id",
            Self::IteratedSha256 => "iterated-sha256",
        })
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::XorStream => "xor-stream",
        })
    }
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl VaultConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: VaultConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `STARDUST_DATA_DIR`
    /// - `STARDUST_STORAGE_BACKEND`
    /// - `STARDUST_WALLET_ID`
    /// - `STARDUST_KDF`
    /// - `STARDUST_CIPHER`
    /// - `STARDUST_LOG_LEVEL`
    /// - `STARDUST_ALLOW_UNTRUSTED`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("STARDUST_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("STARDUST_STORAGE_BACKEND") {
            self.storage.backend = v.parse().context("STARDUST_STORAGE_BACKEND")?;
        }
        if let Ok(v) = std::env::var("STARDUST_WALLET_ID") {
            self.wallet.id = v;
        }
        if let Ok(v) = std::env::var("STARDUST_KDF") {
            self.kdf.algorithm = v.parse().context("STARDUST_KDF")?;
        }
        if let Ok(v) = std::env::var("STARDUST_CIPHER") {
            self.cipher.algorithm = v.parse().context("STARDUST_CIPHER")?;
        }
        if let Ok(v) = std::env::var("STARDUST_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("STARDUST_ALLOW_UNTRUSTED") {
            self.storage.allow_untrusted = parse_flag(&v).context("STARDUST_ALLOW_UNTRUSTED")?;
        }
        Ok(())
    }

    /// Path of the SQLite database used by the local backend.
    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join("vault.db")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.wallet.id.trim().is_empty(), "wallet.id must not be empty");

        anyhow::ensure!(
            self.wallet.min_password_len >= stardust_vault::password::MIN_PASSWORD_LEN,
            "wallet.min_password_len must be >= {}",
            stardust_vault::password::MIN_PASSWORD_LEN
        );

        if self.storage.backend == StorageBackend::OsKeystore {
            anyhow::ensure!(
                !self.storage.service_name.is_empty(),
                "storage.service_name must not be empty"
            );
        }

        // Refuse early rather than at first use.
        if self.storage.backend == StorageBackend::Local {
            anyhow::ensure!(
                self.storage.allow_untrusted,
                "storage.backend = \"local\" is not encrypted at rest; set storage.allow_untrusted = true to use it"
            );
        }

        match self.kdf.algorithm {
            KdfAlgorithm::Argon2id => {
                anyhow::ensure!(self.kdf.t_cost >= 1, "kdf.t_cost must be >= 1");
                anyhow::ensure!(self.kdf.p_cost >= 1, "kdf.p_cost must be >= 1");
                anyhow::ensure!(
                    self.kdf.m_cost >= 8 * self.kdf.p_cost,
                    "kdf.m_cost must be >= 8 * kdf.p_cost"
                );
            }
            KdfAlgorithm::IteratedSha256 => {
                anyhow::ensure!(
                    self.kdf.rounds >= stardust_vault::kdf::MIN_HASH_ROUNDS,
                    "kdf.rounds must be >= {}",
                    stardust_vault::kdf::MIN_HASH_ROUNDS
                );
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
