//! Per-account outcomes and the batch report

use std::fmt;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::ledger::TokenMetadata;

use super::types::OwnerId;

/// How one account's transfer attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    /// Whole balance moved; carries the confirmed signature
    Success(String),
    /// Nothing to move, no transaction sent
    EmptyBalance,
    /// Record or ledger problem; carries a human-readable reason
    Failure(String),
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::Failure(_))
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success(_) => write!(f, "SUCCESS"),
            OutcomeStatus::EmptyBalance => write!(f, "EMPTY"),
            OutcomeStatus::Failure(_) => write!(f, "FAILED"),
        }
    }
}

/// Result of running the transfer pipeline on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    address: String,
    starting_balance: u64,
    status: OutcomeStatus,
}

impl TransferOutcome {
    pub(crate) fn success(address: &Pubkey, amount: u64, signature: &Signature) -> Self {
        Self {
            address: address.to_string(),
            starting_balance: amount,
            status: OutcomeStatus::Success(signature.to_string()),
        }
    }

    pub(crate) fn empty(address: &Pubkey) -> Self {
        Self {
            address: address.to_string(),
            starting_balance: 0,
            status: OutcomeStatus::EmptyBalance,
        }
    }

    /// `address` is a display label when the record never yielded an account
    pub(crate) fn failure(
        address: impl Into<String>,
        starting_balance: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            starting_balance,
            status: OutcomeStatus::Failure(reason.into()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Balance observed before any transfer, in smallest units
    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    pub fn status(&self) -> &OutcomeStatus {
        &self.status
    }

    /// Signature on success, failure reason on failure
    pub fn detail(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Success(sig) => Some(sig),
            OutcomeStatus::Failure(reason) => Some(reason),
            OutcomeStatus::EmptyBalance => None,
        }
    }

    /// One report line; amounts use token decimals when known
    pub fn render(&self, metadata: Option<&TokenMetadata>) -> String {
        let amount = match metadata {
            Some(meta) => meta.format_amount(self.starting_balance),
            None => self.starting_balance.to_string(),
        };

        match &self.status {
            OutcomeStatus::Success(sig) => {
                format!("[{}] {} moved {} (tx: {})", self.status, self.address, amount, sig)
            }
            OutcomeStatus::EmptyBalance => {
                format!("[{}] {} has no balance", self.status, self.address)
            }
            OutcomeStatus::Failure(reason) => {
                format!("[{}] {}: {}", self.status, self.address, reason)
            }
        }
    }
}

/// Ordered outcomes of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    owner_id: OwnerId,
    token: String,
    metadata: Option<TokenMetadata>,
    outcomes: Vec<TransferOutcome>,
    cancelled: bool,
}

impl BatchReport {
    pub(crate) fn new(owner_id: OwnerId, token: &Pubkey, metadata: Option<TokenMetadata>) -> Self {
        Self {
            owner_id,
            token: token.to_string(),
            metadata,
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    pub(crate) fn push(&mut self, outcome: TransferOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.metadata.as_ref()
    }

    /// Outcomes in processing order
    pub fn outcomes(&self) -> &[TransferOutcome] {
        &self.outcomes
    }

    /// True when the caller stopped the batch before every record ran
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn empty_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::EmptyBalance)
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failure()).count()
    }

    /// Sum of confirmed transfers in smallest units
    pub fn total_moved(&self) -> u128 {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .map(|o| u128::from(o.starting_balance))
            .sum()
    }

    pub fn summary(&self) -> String {
        let total = match &self.metadata {
            Some(meta) => u64::try_from(self.total_moved())
                .map(|t| meta.format_amount(t))
                .unwrap_or_else(|_| self.total_moved().to_string()),
            None => self.total_moved().to_string(),
        };

        let mut line = format!(
            "{} succeeded, {} empty, {} failed, {} moved",
            self.success_count(),
            self.empty_count(),
            self.failure_count(),
            total
        );
        if self.cancelled {
            line.push_str(" (cancelled before all accounts were processed)");
        }
        line
    }

    /// Full multi-line report
    pub fn render(&self) -> String {
        let token_label = match &self.metadata {
            Some(meta) if !meta.name.is_empty() => format!("{} ({})", meta.name, self.token),
            _ => self.token.clone(),
        };

        let mut out = format!(
            "Transfer report for owner {}: {}\n",
            self.owner_id, token_label
        );
        for outcome in &self.outcomes {
            out.push_str("  ");
            out.push_str(&outcome.render(self.metadata.as_ref()));
            out.push('\n');
        }
        out.push_str(&self.summary());
        out
    }
}
