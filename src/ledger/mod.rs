//! Ledger gateway
//!
//! The capability the transfer pipeline consumes: balance reads, token
//! metadata, and signed transfers that block until confirmed.

pub mod mint;
pub mod solana;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};

use crate::error::Result;

pub use solana::SolanaGateway;

/// Display metadata for a token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    /// Format a smallest-unit amount for display
    ///
    /// Integer arithmetic only; the result is never fed back into a transfer.
    pub fn format_amount(&self, raw: u64) -> String {
        let Some(scale) = 10u128.checked_pow(u32::from(self.decimals)) else {
            return raw.to_string();
        };

        let raw = u128::from(raw);
        let whole = raw / scale;
        let frac = raw % scale;

        let mut out = whole.to_string();
        if frac > 0 {
            let digits = format!("{:0width$}", frac, width = usize::from(self.decimals));
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
        if !self.symbol.is_empty() {
            out.push(' ');
            out.push_str(&self.symbol);
        }
        out
    }
}

/// Blockchain capability used by the custody pipeline
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Token balance of `owner` in the token's smallest unit
    async fn get_balance(&self, owner: &Pubkey, token: &Pubkey) -> Result<u64>;

    async fn get_token_metadata(&self, token: &Pubkey) -> Result<TokenMetadata>;

    /// Native (SOL) balance in lamports
    async fn get_native_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Transfer `amount` of `token` from the signer to `destination`
    ///
    /// Blocks until the ledger confirms inclusion or the gateway's own
    /// timeout expires. Never retried by callers.
    async fn sign_and_send(
        &self,
        signer: &Keypair,
        token: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<Signature>;
}

/// Convert lamports to SOL for display
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
