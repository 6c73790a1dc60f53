//! Stardust Vault CLI: create, unlock and manage a password-protected wallet
//!
//! Builds one `KeyProtectionService` from config and runs a single
//! subcommand against it.
//!
//! # Usage
//!
//! ```bash
//! stardust-vault create --address 5F...        # new 12-word wallet
//! stardust-vault unlock --show                   # decrypt and print the phrase
//! stardust-vault --wallet savings unlock         # another stored wallet
//! stardust-vault use savings                     # select the current wallet
//! STARDUST_PASSWORD=... stardust-vault unlock    # scripted use
//! stardust-vault --config vault.toml validate-config
//! ```

mod commands;
mod config;

use anyhow::{Context, Result};
use commands::{Command, Io, Options};
use stardust_vault::{VaultError, WordCount};
use std::path::PathBuf;
use zeroize::Zeroizing;

#[derive(Debug)]
struct Args {
    config_path: Option<PathBuf>,
    command: Command,
    options: Options,
}

enum Parsed {
    Run(Args),
    Help,
    Version,
}

fn main() {
    // Security hardening: a crash must not write a decrypted phrase to disk
    stardust_vault::memory::disable_core_dumps();

    match real_main() {
        Ok(()) => {}
        Err(e) => {
            match e.downcast_ref::<VaultError>() {
                Some(vault_err) => {
                    log::debug!("{:#}", e);
                    eprintln!("Error: {}", vault_err.user_message());
                }
                None => eprintln!("Error: {:#}", e),
            }
            std::process::exit(1);
        }
    }
}

fn real_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args)? {
        Parsed::Run(args) => args,
        Parsed::Help => {
            print_help();
            return Ok(());
        }
        Parsed::Version => {
            println!("stardust-vault {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    // Load config
    let mut vault_config = config::VaultConfig::load(args.config_path.as_deref()).with_context(|| {
        match &args.config_path {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load default config".to_string(),
        }
    })?;

    // Apply env overrides
    vault_config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    // Validate
    vault_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &vault_config.logging.level);
    env_logger::init();

    if args.command == Command::ValidateConfig {
        println!("✅ Configuration is valid.");
        println!("  Backend:       {}", vault_config.storage.backend);
        if vault_config.storage.backend == config::StorageBackend::Local {
            println!("  Database:      {}", vault_config.database_path().display());
        }
        println!("  Wallet:        {}", vault_config.wallet.id);
        println!("  Min password:  {} chars", vault_config.wallet.min_password_len);
        println!("  KDF:           {}", vault_config.kdf.algorithm);
        println!("  Cipher:        {}", vault_config.cipher.algorithm);
        return Ok(());
    }

    let vault = commands::build_service(&vault_config)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    let mut io = Io {
        input: &mut input,
        output: &mut output,
        password: env_secret("STARDUST_PASSWORD"),
        new_password: env_secret("STARDUST_NEW_PASSWORD"),
    };

    rt.block_on(commands::run(args.command, &vault, &args.options, &mut io))
}

fn env_secret(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name).ok().map(Zeroizing::new)
}

// Minimal parsing, no clap.
fn parse_args(args: &[String]) -> Result<Parsed> {
    let mut config_path = None;
    let mut command = None;
    let mut options = Options::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let path = args.get(i).context("--config requires a path argument")?;
                config_path = Some(PathBuf::from(path));
            }
            "--wallet" | "-w" => {
                i += 1;
                let wallet = args.get(i).context("--wallet requires a wallet id")?;
                options.wallet = Some(wallet.clone());
            }
            "--address" | "-a" => {
                i += 1;
                let address = args.get(i).context("--address requires a value")?;
                options.address = Some(address.clone());
            }
            "--words" => {
                i += 1;
                let words = args.get(i).context("--words requires 12 or 24")?;
                let count: usize = words.parse().context("--words requires 12 or 24")?;
                options.words = WordCount::try_from(count)?;
            }
            "--show" => options.show = true,
            "--yes" | "-y" => options.yes = true,
            "--force" | "-f" => options.force = true,
            "--help" | "-h" => return Ok(Parsed::Help),
            "--version" | "-V" => return Ok(Parsed::Version),
            flag if flag.starts_with('-') => {
                anyhow::bail!("Unknown argument: {}", flag);
            }
            name if command == Some(Command::Use) && options.wallet.is_none() => {
                options.wallet = Some(name.to_string());
            }
            name => {
                anyhow::ensure!(command.is_none(), "Unexpected argument: {}", name);
                command = Some(
                    Command::parse(name).with_context(|| format!("Unknown command: {}", name))?,
                );
            }
        }
        i += 1;
    }

    match command {
        Some(command) => Ok(Parsed::Run(Args {
            config_path,
            command,
            options,
        })),
        None => Ok(Parsed::Help),
    }
}

fn print_help() {
    println!(
        r#"Stardust Vault: password-protected recovery phrase storage

USAGE:
    stardust-vault [OPTIONS] <COMMAND>

COMMANDS:
    create            Generate a new recovery phrase and store it
    import            Read a recovery phrase from stdin and store it
    unlock            Decrypt the stored phrase (prints it with --show)
    status            Show whether a wallet is stored and on which backend
    address           Print the stored wallet address
    change-password   Re-encrypt the stored phrase under a new password
    delete            Remove the stored wallet (requires --yes)
    list              List stored wallets; * marks the current one
    use <ID>          Select the current wallet
    delete-all        Remove every stored wallet (requires --yes)
    validate-config   Validate configuration and exit

OPTIONS:
    -c, --config <PATH>    Config file path (defaults apply if omitted)
    -w, --wallet <ID>      Wallet to operate on (overrides [wallet] id)
    -a, --address <ADDR>   Wallet address to store (create, import)
    --words <12|24>        Phrase length for create (default: 12)
    --show                 Print the phrase after unlocking
    -f, --force            Replace an existing wallet (create, import)
    -y, --yes              Confirm deletion (delete, delete-all)
    -h, --help             Show this help message
    -V, --version          Show version

ENVIRONMENT VARIABLES (override config file):
    STARDUST_DATA_DIR          Directory for the local database
    STARDUST_STORAGE_BACKEND   os-keystore / local / memory
    STARDUST_ALLOW_UNTRUSTED   Accept the local backend (true/false, yes/no, on/off)
    STARDUST_WALLET_ID         Wallet namespace
    STARDUST_KDF               argon2id / iterated-sha256
    STARDUST_CIPHER            aes-256-gcm / xor-stream
    STARDUST_LOG_LEVEL         Log level (error/warn/info/debug/trace)
    STARDUST_PASSWORD          Password (instead of stdin)
    STARDUST_NEW_PASSWORD      New password for change-password

EXAMPLES:
    # Create a wallet in the OS keystore
    stardust-vault create --address 5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty

    # Restore from a phrase into a local database
    STARDUST_STORAGE_BACKEND=local STARDUST_ALLOW_UNTRUSTED=true \
        stardust-vault import --address 5F...

    # Scripted unlock
    STARDUST_PASSWORD=... stardust-vault unlock
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_args(list: &[&str]) -> Args {
        match parse_args(&args(list)).unwrap() {
            Parsed::Run(args) => args,
            _ => panic!("expected a command"),
        }
    }

    #[test]
    fn test_parse_create() {
        let parsed = run_args(&["-c", "vault.toml", "create", "--address", "5Fabc", "--words", "24"]);
        assert_eq!(parsed.command, Command::Create);
        assert_eq!(parsed.config_path, Some(PathBuf::from("vault.toml")));
        assert_eq!(parsed.options.address.as_deref(), Some("5Fabc"));
        assert_eq!(parsed.options.words, WordCount::TwentyFour);
    }

    #[test]
    fn test_parse_flags() {
        let parsed = run_args(&["delete", "--yes"]);
        assert_eq!(parsed.command, Command::Delete);
        assert!(parsed.options.yes);
        assert!(!parsed.options.force);
    }

    #[test]
    fn test_parse_wallet_selection() {
        let parsed = run_args(&["use", "savings"]);
        assert_eq!(parsed.command, Command::Use);
        assert_eq!(parsed.options.wallet.as_deref(), Some("savings"));

        let parsed = run_args(&["-w", "savings", "unlock", "--show"]);
        assert_eq!(parsed.command, Command::Unlock);
        assert_eq!(parsed.options.wallet.as_deref(), Some("savings"));

        assert!(parse_args(&args(&["use", "a", "b"])).is_err());
        assert!(parse_args(&args(&["unlock", "--wallet"])).is_err());
    }

    #[test]
    fn test_no_command_shows_help() {
        assert!(matches!(parse_args(&[]).unwrap(), Parsed::Help));
        assert!(matches!(parse_args(&args(&["-V"])).unwrap(), Parsed::Version));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["explode"])).is_err());
        assert!(parse_args(&args(&["unlock", "--bogus"])).is_err());
        assert!(parse_args(&args(&["create", "--words", "15"])).is_err());
        assert!(parse_args(&args(&["create", "--address"])).is_err());
        assert!(parse_args(&args(&["unlock", "status"])).is_err());
    }
}
