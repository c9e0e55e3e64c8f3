//! Solana RPC gateway for SPL token balances and transfers

use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::{debug, info, warn};

use crate::config::RpcConfig;
use crate::error::{Error, Result};

use super::mint::{
    decode_decimals, decode_name_symbol, ensure_token_program, metadata_address,
};
use super::{LedgerGateway, TokenMetadata};

/// [`LedgerGateway`] over a Solana JSON-RPC endpoint
pub struct SolanaGateway {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaGateway {
    pub fn new(endpoint: String, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(endpoint, timeout, commitment),
            commitment,
        }
    }

    pub fn from_config(config: &RpcConfig) -> Result<Self> {
        Ok(Self::new(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
            config.commitment_config()?,
        ))
    }

    /// Mint account data, checked to belong to the SPL token program
    async fn fetch_mint(&self, token: &Pubkey) -> Result<Vec<u8>> {
        let account = self
            .rpc
            .get_account(token)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to fetch mint {}: {}", token, e)))?;

        ensure_token_program(token, &account.owner)?;
        Ok(account.data)
    }

    async fn fetch_decimals(&self, token: &Pubkey) -> Result<u8> {
        decode_decimals(&self.fetch_mint(token).await?)
    }
}

#[async_trait]
impl LedgerGateway for SolanaGateway {
    async fn get_balance(&self, owner: &Pubkey, token: &Pubkey) -> Result<u64> {
        let ata = get_associated_token_address(owner, token);
        let response = self
            .rpc
            .get_account_with_commitment(&ata, self.commitment)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to get balance: {}", e)))?;

        // No token account yet means nothing to move, but only for a mint
        // whose accounts live under the SPL token program
        let Some(account) = response.value else {
            self.fetch_mint(token).await?;
            debug!("No token account {} for {}", ata, owner);
            return Ok(0);
        };

        let token_account = spl_token::state::Account::unpack(&account.data)
            .map_err(|e| Error::Ledger(format!("Invalid token account {}: {}", ata, e)))?;

        Ok(token_account.amount)
    }

    async fn get_token_metadata(&self, token: &Pubkey) -> Result<TokenMetadata> {
        let decimals = self.fetch_decimals(token).await?;

        let metadata_account = self
            .rpc
            .get_account_with_commitment(&metadata_address(token), self.commitment)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to fetch token metadata: {}", e)))?
            .value;

        let (name, symbol) = match metadata_account {
            Some(account) => decode_name_symbol(&account.data).unwrap_or_else(|e| {
                warn!("Unreadable metadata for {}: {}", token, e);
                (String::new(), String::new())
            }),
            None => (String::new(), String::new()),
        };

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    async fn get_native_balance(&self, address: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to get balance: {}", e)))
    }

    async fn sign_and_send(
        &self,
        signer: &Keypair,
        token: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<Signature> {
        let source = signer.pubkey();
        debug!(
            "Executing token transfer: {} units of {} from {} to {}",
            amount, token, source, destination
        );

        let decimals = self.fetch_decimals(token).await?;
        let source_ata = get_associated_token_address(&source, token);
        let destination_ata = get_associated_token_address(destination, token);

        // Source pays for the destination token account if it does not exist yet
        let create_destination =
            create_associated_token_account_idempotent(&source, destination, token, &spl_token::id());

        let transfer = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source_ata,
            token,
            &destination_ata,
            &source,
            &[],
            amount,
            decimals,
        )
        .map_err(|e| Error::TransactionSend(format!("Failed to build transfer: {}", e)))?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| Error::TransactionSend(format!("Failed to get blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &[create_destination, transfer],
            Some(&source),
            &[signer],
            blockhash,
        );

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| Error::TransactionSend(format!("Transfer failed: {}", e)))?;

        info!(
            "Transfer complete: {} units of {} to {} (sig: {})",
            amount, token, destination, signature
        );

        Ok(signature)
    }
}
