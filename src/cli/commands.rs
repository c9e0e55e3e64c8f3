//! CLI command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dialoguer::{Confirm, Password};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::custody::{KeyDeriver, MasterSecret, SecretVault};
use crate::ledger::{LedgerGateway, SolanaGateway};
use crate::store::{JsonFileStore, SecretStore};
use crate::wallet::{BatchOrchestrator, CredentialManager, OwnerId, TransferPipeline};

/// Everything a command needs, wired from configuration
struct Services {
    credentials: CredentialManager,
    batch: BatchOrchestrator,
}

async fn services(config: &Config) -> Result<Services> {
    let master = MasterSecret::from_env(&config.vault.master_secret_env)
        .context("Master secret unavailable")?;
    let deriver = KeyDeriver::new(Arc::new(master), config.vault.kdf_iterations)?;
    let vault = SecretVault::new(deriver);

    let store: Arc<dyn SecretStore> = Arc::new(
        JsonFileStore::open(&config.storage.path)
            .await
            .with_context(|| format!("Failed to open store {}", config.storage.path))?,
    );
    let ledger: Arc<dyn LedgerGateway> = Arc::new(SolanaGateway::from_config(&config.rpc)?);

    let pipeline = TransferPipeline::new(vault.clone(), ledger);
    Ok(Services {
        credentials: CredentialManager::new(store.clone(), vault),
        batch: BatchOrchestrator::new(store, pipeline).with_throttle(config.batch.throttle()),
    })
}

/// Register a new account from a hidden prompt
pub async fn wallet_add(config: &Config, owner: OwnerId) -> Result<()> {
    let services = services(config).await?;

    let secret = Zeroizing::new(
        Password::new()
            .with_prompt("Private key (0x followed by 64 hex characters)")
            .interact()?,
    );

    let address = services
        .credentials
        .register(owner, &secret)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to add account: {}", e))?;

    println!("Account added: {}", address);
    Ok(())
}

/// List registered accounts
pub async fn wallet_list(config: &Config, owner: OwnerId) -> Result<()> {
    let services = services(config).await?;
    let accounts = services.credentials.list_accounts(owner).await?;

    if accounts.is_empty() {
        println!("No accounts registered for owner {}", owner);
        return Ok(());
    }

    println!("\n=== REGISTERED ACCOUNTS ===\n");
    println!("{:<46} {:<8} {}", "ADDRESS", "DEFAULT", "ADDED");
    println!("{}", "-".repeat(80));

    for account in &accounts {
        let address = match (&account.address, &account.problem) {
            (Some(address), _) => address.to_string(),
            (None, Some(problem)) => format!("UNUSABLE ({})", problem),
            (None, None) => "UNUSABLE".to_string(),
        };
        println!(
            "{:<46} {:<8} {}",
            address,
            if account.is_default { "yes" } else { "" },
            account.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let unusable = accounts.iter().filter(|a| !a.is_usable()).count();
    if unusable > 0 {
        warn!("{} of {} records cannot be opened", unusable, accounts.len());
    }

    println!();
    Ok(())
}

/// Delete every registered account
pub async fn wallet_delete(config: &Config, owner: OwnerId, force: bool) -> Result<()> {
    let services = services(config).await?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all accounts of owner {}? This cannot be undone.",
                owner
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Delete cancelled by user");
            return Ok(());
        }
    }

    let removed = services.credentials.delete_all(owner).await?;
    println!("Deleted {} accounts", removed);
    Ok(())
}

/// Native balances of every account and the destination
pub async fn wallet_overview(config: &Config, owner: OwnerId) -> Result<()> {
    let services = services(config).await?;
    let overview = services.batch.wallets_overview(owner).await?;

    println!("\n=== WALLETS ===\n");
    print!("{}", overview.render());
    Ok(())
}

pub async fn destination_set(config: &Config, owner: OwnerId, address: &str) -> Result<()> {
    let services = services(config).await?;
    let destination = services
        .credentials
        .set_destination(owner, address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to set destination: {}", e))?;

    println!("Destination set: {}", destination);
    Ok(())
}

pub async fn destination_show(config: &Config, owner: OwnerId) -> Result<()> {
    let services = services(config).await?;
    match services.credentials.destination(owner).await? {
        Some(destination) => println!("Destination: {}", destination),
        None => println!("No destination set for owner {}", owner),
    }
    Ok(())
}

/// Token balance of every account, read-only
pub async fn check(config: &Config, owner: OwnerId, token: &str) -> Result<()> {
    let services = services(config).await?;
    let balances = services.batch.check_balances(owner, token).await?;

    print!("{}", balances.render());
    Ok(())
}

/// Sweep every account's balance of `token` to the destination
pub async fn transfer(config: &Config, owner: OwnerId, token: &str, force: bool) -> Result<()> {
    let services = services(config).await?;

    let destination = services
        .credentials
        .destination(owner)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!("No destination set. Run 'sweeper destination set <ADDRESS>' first")
        })?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Move all {} from every account to {}? This cannot be undone.",
                token, destination
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Transfer cancelled by user");
            return Ok(());
        }
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, stopping after the current account");
            on_signal.cancel();
        }
    });

    let result = services
        .batch
        .run_batch_with_cancel(owner, token, &cancel)
        .await;
    signal_task.abort();

    let report = result.map_err(|e| anyhow::anyhow!("Transfer failed: {}", e))?;

    println!();
    println!("{}", report.render());
    Ok(())
}

/// Print a fresh random master secret
pub fn keygen(config: &Config) -> Result<()> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut bytes[..]);
    let key = Zeroizing::new(URL_SAFE_NO_PAD.encode(&bytes[..]));

    println!("Add this line to your .env file and keep it out of version control:\n");
    println!("{}={}", config.vault.master_secret_env, key.as_str());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
