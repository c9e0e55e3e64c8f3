//! Read-only balance overviews
//!
//! Same record isolation as a batch: an unusable record or a failed query
//! shows up as a problem on its own line and never hides the others.

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::custody::parse_address;
use crate::error::Result;
use crate::ledger::{lamports_to_sol, TokenMetadata};

use super::batch::BatchOrchestrator;
use super::transfer::{failure_reason, log_failure, unlock_record};
use super::types::OwnerId;

/// Balance line for one registered account
#[derive(Debug, Clone)]
pub struct AccountBalance {
    /// Address, or a record label when the record is unusable
    pub label: String,
    pub balance: Option<u64>,
    pub problem: Option<String>,
}

impl AccountBalance {
    fn known(address: &Pubkey, balance: u64) -> Self {
        Self {
            label: address.to_string(),
            balance: Some(balance),
            problem: None,
        }
    }

    fn problem(label: String, problem: String) -> Self {
        Self {
            label,
            balance: None,
            problem: Some(problem),
        }
    }
}

/// Token balances of every account of an owner
#[derive(Debug, Clone)]
pub struct TokenBalances {
    pub token: Pubkey,
    pub metadata: Option<TokenMetadata>,
    pub accounts: Vec<AccountBalance>,
}

impl TokenBalances {
    pub fn total(&self) -> u128 {
        self.accounts
            .iter()
            .filter_map(|a| a.balance)
            .map(u128::from)
            .sum()
    }

    pub fn render(&self) -> String {
        let mut out = format!("Balances of {}\n", self.token);
        for account in &self.accounts {
            let line = match (account.balance, &account.problem) {
                (Some(balance), _) => match &self.metadata {
                    Some(meta) => meta.format_amount(balance),
                    None => balance.to_string(),
                },
                (None, Some(problem)) => format!("unavailable ({})", problem),
                (None, None) => "unavailable".to_string(),
            };
            out.push_str(&format!("  {}: {}\n", account.label, line));
        }
        out
    }
}

/// Native balances of an owner's accounts and destination
#[derive(Debug, Clone)]
pub struct WalletsOverview {
    pub accounts: Vec<AccountBalance>,
    /// Destination address and its native balance, when one is set
    pub destination: Option<AccountBalance>,
}

impl WalletsOverview {
    pub fn render(&self) -> String {
        let mut out = String::from("Accounts:\n");
        for account in &self.accounts {
            out.push_str(&format!("  {}\n", native_line(account)));
        }
        match &self.destination {
            Some(destination) => {
                out.push_str(&format!("Destination:\n  {}\n", native_line(destination)))
            }
            None => out.push_str("Destination: not set\n"),
        }
        out
    }
}

fn native_line(account: &AccountBalance) -> String {
    match (account.balance, &account.problem) {
        (Some(lamports), _) => format!("{}: {:.9} SOL", account.label, lamports_to_sol(lamports)),
        (None, Some(problem)) => format!("{}: unavailable ({})", account.label, problem),
        (None, None) => format!("{}: unavailable", account.label),
    }
}

impl BatchOrchestrator {
    /// Token balance of every account, without moving anything
    pub async fn check_balances(&self, owner_id: OwnerId, token: &str) -> Result<TokenBalances> {
        let token = parse_address(token)?;
        let records = self.records_for(owner_id).await?;
        let metadata = self.fetch_metadata(&token).await;
        let vault = self.pipeline().vault();

        let mut accounts = Vec::with_capacity(records.len());
        for record in &records {
            let account = match unlock_record(vault, record).await {
                Ok(account) => account,
                Err(e) => {
                    log_failure(owner_id, &record.label(), &e);
                    accounts.push(AccountBalance::problem(record.label(), failure_reason(&e)));
                    continue;
                }
            };

            let address = account.address();
            match self.ledger().get_balance(&address, &token).await {
                Ok(balance) => accounts.push(AccountBalance::known(&address, balance)),
                Err(e) => {
                    log_failure(owner_id, &address.to_string(), &e);
                    accounts.push(AccountBalance::problem(address.to_string(), failure_reason(&e)));
                }
            }
        }

        debug!("Owner {}: checked {} accounts", owner_id, accounts.len());
        Ok(TokenBalances {
            token,
            metadata,
            accounts,
        })
    }

    /// Native balance of every account plus the destination
    pub async fn wallets_overview(&self, owner_id: OwnerId) -> Result<WalletsOverview> {
        let records = self.records_for(owner_id).await?;
        let vault = self.pipeline().vault();

        let mut accounts = Vec::with_capacity(records.len());
        for record in &records {
            match unlock_record(vault, record).await {
                Ok(account) => accounts.push(self.native_balance(&account.address()).await),
                Err(e) => {
                    log_failure(owner_id, &record.label(), &e);
                    accounts.push(AccountBalance::problem(record.label(), failure_reason(&e)))
                }
            }
        }

        let destination = match self.store().get_destination(owner_id).await? {
            Some(stored) => Some(match parse_address(&stored) {
                Ok(address) => self.native_balance(&address).await,
                Err(e) => AccountBalance::problem(stored, e.to_string()),
            }),
            None => None,
        };

        Ok(WalletsOverview {
            accounts,
            destination,
        })
    }

    async fn native_balance(&self, address: &Pubkey) -> AccountBalance {
        match self.ledger().get_native_balance(address).await {
            Ok(lamports) => AccountBalance::known(address, lamports),
            Err(e) => AccountBalance::problem(address.to_string(), failure_reason(&e)),
        }
    }
}
