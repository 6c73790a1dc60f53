//! Subcommands: each one drives a single `KeyProtectionService` operation.

use crate::config::{CipherAlgorithm, KdfAlgorithm, StorageBackend, VaultConfig};
use anyhow::{Context, Result};
use stardust_vault::{
    Aes256GcmCipher, Argon2Kdf, IteratedHashKdf, KdfParams, KeyDerivation, KeyProtectionService,
    LocalStorage, MemoryStorage, MnemonicCipher, OsKeystore, SecureStorage, ServiceOptions,
    WordCount, XorStreamCipher,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Import,
    Unlock,
    Status,
    Address,
    ChangePassword,
    Delete,
    List,
    Use,
    DeleteAll,
    ValidateConfig,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "create" => Self::Create,
            "import" => Self::Import,
            "unlock" => Self::Unlock,
            "status" => Self::Status,
            "address" => Self::Address,
            "change-password" => Self::ChangePassword,
            "delete" => Self::Delete,
            "list" => Self::List,
            "use" => Self::Use,
            "delete-all" => Self::DeleteAll,
            "validate-config" => Self::ValidateConfig,
            _ => return None,
        })
    }
}

/// Per-invocation flags.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Wallet id overriding `[wallet] id`; the target of `use`
    pub wallet: Option<String>,
    pub address: Option<String>,
    pub words: WordCount,
    pub show: bool,
    pub yes: bool,
    pub force: bool,
}

/// Where secrets come from and where output goes.
///
/// Passwords set here (from `STARDUST_PASSWORD` / `STARDUST_NEW_PASSWORD`)
/// take precedence over stdin.
pub struct Io<'a> {
    pub input: &'a mut dyn BufRead,
    pub output: &'a mut dyn Write,
    pub password: Option<Zeroizing<String>>,
    pub new_password: Option<Zeroizing<String>>,
}

impl Io<'_> {
    fn read_line(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        eprint!("{}", prompt);
        let mut line = Zeroizing::new(String::new());
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        anyhow::ensure!(read > 0, "unexpected end of input");
        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(line)
    }

    fn password(&mut self) -> Result<Zeroizing<String>> {
        match self.password.take() {
            Some(password) => Ok(password),
            None => self.read_line("Password: "),
        }
    }

    /// New password, confirmed when typed interactively.
    fn new_password(&mut self, from_env: bool) -> Result<Zeroizing<String>> {
        let preset = if from_env {
            self.new_password.take()
        } else {
            self.password.take()
        };
        if let Some(password) = preset {
            return Ok(password);
        }

        let password = self.read_line("New password: ")?;
        let confirm = self.read_line("Confirm password: ")?;
        anyhow::ensure!(*password == *confirm, "passwords do not match");
        Ok(password)
    }
}

// ============================================================================
// Service construction
// ============================================================================

/// Build the one service instance this process uses.
pub fn build_service(config: &VaultConfig) -> Result<KeyProtectionService> {
    let storage: Arc<dyn SecureStorage> = match config.storage.backend {
        StorageBackend::OsKeystore => Arc::new(OsKeystore::new(&config.storage.service_name)),
        StorageBackend::Local => {
            std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
                format!(
                    "Failed to create data dir: {}",
                    config.storage.data_dir.display()
                )
            })?;
            let path = config.database_path();
            Arc::new(
                LocalStorage::open(&path)
                    .with_context(|| format!("Failed to open database: {}", path.display()))?,
            )
        }
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    let kdf: Arc<dyn KeyDerivation> = match config.kdf.algorithm {
        KdfAlgorithm::Argon2id => Arc::new(
            Argon2Kdf::new(KdfParams {
                m_cost: config.kdf.m_cost,
                t_cost: config.kdf.t_cost,
                p_cost: config.kdf.p_cost,
            })
            .context("Invalid Argon2 parameters")?,
        ),
        KdfAlgorithm::IteratedSha256 => Arc::new(
            IteratedHashKdf::sha256(config.kdf.rounds).context("Invalid iterated hash rounds")?,
        ),
    };

    let cipher: Arc<dyn MnemonicCipher> = match config.cipher.algorithm {
        CipherAlgorithm::Aes256Gcm => Arc::new(Aes256GcmCipher),
        CipherAlgorithm::XorStream => Arc::new(XorStreamCipher),
    };

    let options = ServiceOptions {
        wallet_id: config.wallet.id.clone(),
        min_password_len: config.wallet.min_password_len,
        allow_untrusted: config.storage.allow_untrusted,
    };

    Ok(KeyProtectionService::new(storage, kdf, cipher, options)?)
}

// ============================================================================
// Commands
// ============================================================================

pub async fn run(
    command: Command,
    vault: &KeyProtectionService,
    options: &Options,
    io: &mut Io<'_>,
) -> Result<()> {
    let selected;
    let vault = match options.wallet.as_deref() {
        Some(id) if command != Command::Use => {
            selected = vault.for_wallet(id)?;
            &selected
        }
        _ => vault,
    };

    match command {
        Command::Create => create(vault, options, io).await,
        Command::Import => import(vault, options, io).await,
        Command::Unlock => unlock(vault, options, io).await,
        Command::Status => status(vault, io).await,
        Command::Address => address(vault, io).await,
        Command::ChangePassword => change_password(vault, io).await,
        Command::Delete => delete(vault, options, io).await,
        Command::List => list(vault, io).await,
        Command::Use => use_wallet(vault, options, io).await,
        Command::DeleteAll => delete_all(vault, options, io).await,
        // Handled before a service is built.
        Command::ValidateConfig => Ok(()),
    }
}

fn require_address(options: &Options) -> Result<&str> {
    options
        .address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .context("--address is required")
}

async fn refuse_overwrite(vault: &KeyProtectionService, options: &Options) -> Result<()> {
    if !options.force && vault.has_wallet().await {
        anyhow::bail!(
            "wallet '{}' already exists; pass --force to replace it",
            vault.wallet_id()
        );
    }
    Ok(())
}

async fn create(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    let address = require_address(options)?;
    refuse_overwrite(vault, options).await?;

    let password = io.new_password(false)?;
    let phrase = vault.generate_mnemonic_with(options.words)?;
    vault.store(&phrase, &password, address).await?;

    writeln!(
        io.output,
        "Wallet '{}' created. Write down your recovery phrase:\n\n{}\n",
        vault.wallet_id(),
        phrase.as_str()
    )?;
    Ok(())
}

async fn import(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    let address = require_address(options)?;
    refuse_overwrite(vault, options).await?;

    let phrase = io.read_line("Recovery phrase: ")?;
    anyhow::ensure!(
        vault.validate_mnemonic(&phrase),
        "not a valid 12- or 24-word recovery phrase"
    );

    let password = io.new_password(false)?;
    vault.store(&phrase, &password, address).await?;

    writeln!(io.output, "Wallet '{}' imported.", vault.wallet_id())?;
    Ok(())
}

async fn unlock(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    let password = io.password()?;
    let phrase = vault.retrieve(&password).await?;
    let address = vault.stored_address().await?.unwrap_or_default();

    writeln!(io.output, "Wallet '{}' unlocked ({}).", vault.wallet_id(), address)?;
    if options.show {
        writeln!(io.output, "{}", phrase.as_str())?;
    }
    Ok(())
}

async fn status(vault: &KeyProtectionService, io: &mut Io<'_>) -> Result<()> {
    let tier = vault.security_tier();
    let present = vault.has_wallet().await;

    writeln!(io.output, "Wallet:   {}", vault.wallet_id())?;
    writeln!(io.output, "Storage:  {} tier", tier)?;
    writeln!(io.output, "Stored:   {}", if present { "yes" } else { "no" })?;
    if present {
        if let Some(address) = vault.stored_address().await? {
            writeln!(io.output, "Address:  {}", address)?;
        }
    }
    if !tier.is_platform_protected() {
        writeln!(
            io.output,
            "Warning:  this backend does not protect data at rest"
        )?;
    }
    Ok(())
}

async fn address(vault: &KeyProtectionService, io: &mut Io<'_>) -> Result<()> {
    let address = vault
        .stored_address()
        .await?
        .with_context(|| format!("no wallet stored under '{}'", vault.wallet_id()))?;
    writeln!(io.output, "{}", address)?;
    Ok(())
}

async fn change_password(vault: &KeyProtectionService, io: &mut Io<'_>) -> Result<()> {
    let old = io.password()?;
    let new = io.new_password(true)?;
    vault.change_password(&old, &new).await?;

    writeln!(io.output, "Password changed for wallet '{}'.", vault.wallet_id())?;
    Ok(())
}

async fn delete(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    anyhow::ensure!(
        options.yes,
        "deleting wallet '{}' cannot be undone; pass --yes to confirm",
        vault.wallet_id()
    );
    vault.delete_wallet().await?;

    writeln!(io.output, "Wallet '{}' deleted.", vault.wallet_id())?;
    Ok(())
}

async fn list(vault: &KeyProtectionService, io: &mut Io<'_>) -> Result<()> {
    let wallets = vault.list_wallets().await?;
    if wallets.is_empty() {
        writeln!(io.output, "No wallets stored.")?;
        return Ok(());
    }

    let current = vault.current_wallet().await?;
    for wallet in wallets {
        let marker = if current.as_deref() == Some(wallet.id.as_str()) { '*' } else { ' ' };
        writeln!(
            io.output,
            "{} {:<16} {}  (created {})",
            marker, wallet.id, wallet.address, wallet.created_at
        )?;
    }
    Ok(())
}

async fn use_wallet(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    let id = options.wallet.as_deref().context("use requires a wallet id")?;
    vault.set_current_wallet(id).await?;

    writeln!(io.output, "Current wallet is now '{}'.", id)?;
    Ok(())
}

async fn delete_all(vault: &KeyProtectionService, options: &Options, io: &mut Io<'_>) -> Result<()> {
    anyhow::ensure!(
        options.yes,
        "deleting every stored wallet cannot be undone; pass --yes to confirm"
    );
    let count = vault.list_wallets().await.map(|w| w.len()).unwrap_or_default();
    vault.delete_all_wallets().await?;

    writeln!(io.output, "Deleted {} wallet(s).", count)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
