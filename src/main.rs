//! Token Sweeper - custodial SPL token sweeping
//!
//! # WARNING
//! - Transfers move the whole token balance of every registered account.
//! - Confirmed transfers cannot be undone.
//! - Losing the master secret makes every stored record unrecoverable.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use token_sweeper::cli::commands;
use token_sweeper::config::Config;
use token_sweeper::custody::MasterSecret;
use token_sweeper::wallet::OwnerId;

/// Token Sweeper - move custodied token balances to one destination
#[derive(Parser)]
#[command(name = "sweeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sweeper.toml")]
    config: String,

    /// Owner whose accounts are managed
    #[arg(short, long, env = "SWEEPER_OWNER", default_value_t = 0)]
    owner: OwnerId,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Destination address commands
    Destination {
        #[command(subcommand)]
        action: DestinationAction,
    },

    /// Show the token balance of every account
    Check {
        /// Token mint address
        token: String,
    },

    /// Move the whole token balance of every account to the destination
    Transfer {
        /// Token mint address
        token: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Generate a new master secret
    Keygen,

    /// Show current configuration (secrets masked)
    Config,
}

#[derive(Subcommand)]
enum WalletAction {
    /// Add an account (private key is prompted, never passed as an argument)
    Add,

    /// List registered accounts
    List,

    /// Delete all registered accounts
    Delete {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show SOL balances of all accounts and the destination
    Overview,
}

#[derive(Subcommand)]
enum DestinationAction {
    /// Set the destination address
    Set {
        /// Base58 address
        address: String,
    },

    /// Show the destination address
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("token_sweeper=info".parse()?),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // The master secret must be present before any record is touched
    if needs_master_secret(&cli.command) {
        if let Err(e) = startup_checks(&config) {
            error!("Startup checks failed: {}", e);
            std::process::exit(1);
        }
    }

    let owner = cli.owner;

    // Execute command
    let result = match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Add => commands::wallet_add(&config, owner).await,
            WalletAction::List => commands::wallet_list(&config, owner).await,
            WalletAction::Delete { force } => commands::wallet_delete(&config, owner, force).await,
            WalletAction::Overview => commands::wallet_overview(&config, owner).await,
        },
        Commands::Destination { action } => match action {
            DestinationAction::Set { address } => {
                commands::destination_set(&config, owner, &address).await
            }
            DestinationAction::Show => commands::destination_show(&config, owner).await,
        },
        Commands::Check { token } => commands::check(&config, owner, &token).await,
        Commands::Transfer { token, force } => {
            commands::transfer(&config, owner, &token, force).await
        }
        Commands::Keygen => commands::keygen(&config),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn needs_master_secret(command: &Commands) -> bool {
    !matches!(command, Commands::Keygen | Commands::Config)
}

/// Perform startup safety checks
fn startup_checks(config: &Config) -> Result<()> {
    info!("Performing startup checks...");

    MasterSecret::from_env(&config.vault.master_secret_env)?;

    // Store file must not be readable by others
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let path = std::path::Path::new(&config.storage.path);
        if path.exists() {
            let mode = std::fs::metadata(path)?.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(anyhow::anyhow!(
                    "Store file {} has insecure permissions {:o}. Run 'chmod 600 {}' to fix.",
                    path.display(),
                    mode & 0o777,
                    path.display()
                ));
            }
        }
    }

    info!("Startup checks passed");
    Ok(())
}
