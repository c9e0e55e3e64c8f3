//! Token transfer pipeline
//!
//! Runs one stored record through decrypt, resolve, balance check and
//! transfer. Every failure is folded into a [`TransferOutcome`].

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, error, info, warn};

use crate::custody::{resolve, Account, SecretVault};
use crate::error::{Error, Result};
use crate::ledger::LedgerGateway;

use super::outcome::TransferOutcome;
use super::types::{EncryptedSecretRecord, OwnerId};

const ADDRESS_MISMATCH: &str = "stored address mismatch";

/// Moves the whole token balance of one account to a destination
#[derive(Clone)]
pub struct TransferPipeline {
    vault: SecretVault,
    ledger: Arc<dyn LedgerGateway>,
}

impl TransferPipeline {
    pub fn new(vault: SecretVault, ledger: Arc<dyn LedgerGateway>) -> Self {
        Self { vault, ledger }
    }

    /// Run the pipeline for one record
    ///
    /// Never fails: record and ledger problems become a failed outcome so
    /// the caller can keep going with the next record.
    pub async fn run(
        &self,
        owner_id: OwnerId,
        record: &EncryptedSecretRecord,
        destination: &Pubkey,
        token: &Pubkey,
    ) -> TransferOutcome {
        let account = match unlock_record(&self.vault, record).await {
            Ok(account) => account,
            Err(e) => {
                log_failure(owner_id, &record.label(), &e);
                return TransferOutcome::failure(record.label(), 0, failure_reason(&e));
            }
        };
        let address = account.address();

        let balance = match self.ledger.get_balance(&address, token).await {
            Ok(balance) => balance,
            Err(e) => {
                log_failure(owner_id, &address.to_string(), &e);
                return TransferOutcome::failure(address.to_string(), 0, failure_reason(&e));
            }
        };

        if balance == 0 {
            debug!("{} holds no {}, skipping", address, token);
            return TransferOutcome::empty(&address);
        }

        match self
            .ledger
            .sign_and_send(account.signer(), token, destination, balance)
            .await
        {
            Ok(signature) => {
                info!(
                    "Owner {}: moved {} units from {} (sig: {})",
                    owner_id, balance, address, signature
                );
                TransferOutcome::success(&address, balance, &signature)
            }
            Err(e) => {
                log_failure(owner_id, &address.to_string(), &e);
                TransferOutcome::failure(address.to_string(), balance, failure_reason(&e))
            }
        }
    }

    pub fn vault(&self) -> &SecretVault {
        &self.vault
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerGateway> {
        &self.ledger
    }
}

/// Decrypt a record and rebuild its account
///
/// Key derivation is CPU-bound, so it runs on the blocking pool. The
/// plaintext is dropped (and zeroized) before this returns.
pub(crate) async fn unlock_record(
    vault: &SecretVault,
    record: &EncryptedSecretRecord,
) -> Result<Account> {
    let vault = vault.clone();
    let ciphertext = record.ciphertext.clone();
    let salt = record.salt.clone();

    let account = tokio::task::spawn_blocking(move || {
        let plaintext = vault.decrypt(&ciphertext, &salt)?;
        resolve(&plaintext)
    })
    .await
    .map_err(|e| Error::Internal(format!("unlock task failed: {}", e)))??;

    if let Some(cached) = &record.address {
        if *cached != account.address().to_string() {
            return Err(Error::Authentication(ADDRESS_MISMATCH.to_string()));
        }
    }

    Ok(account)
}

/// Report text for an error caught below the pipeline boundary
pub(crate) fn failure_reason(error: &Error) -> String {
    match error {
        Error::Authentication(msg) if msg == ADDRESS_MISMATCH => msg.clone(),
        Error::Authentication(_) => "undecryptable record".to_string(),
        e if e.is_record_scoped() => e.to_string(),
        other => format!("unexpected error: {}", other),
    }
}

/// Record-scoped problems are expected; anything else points at a bug or
/// a broken environment
pub(crate) fn log_failure(owner_id: OwnerId, label: &str, error: &Error) {
    if error.is_record_scoped() {
        warn!("Owner {}: {} failed: {}", owner_id, label, error);
    } else {
        error!("Owner {}: {} failed unexpectedly: {}", owner_id, label, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::generate_salt;
    use crate::testing::{address_of, test_vault, LedgerCall, MockLedger, SECRET_A, SECRET_B};
    use crate::wallet::outcome::OutcomeStatus;

    fn sealed(vault: &SecretVault, secret: &str, cached: Option<String>) -> EncryptedSecretRecord {
        let salt = generate_salt();
        let ciphertext = vault.encrypt(secret, &salt).unwrap();
        EncryptedSecretRecord::new(1, cached, ciphertext, salt.to_vec(), true)
    }

    #[tokio::test]
    async fn test_success_moves_whole_balance() {
        let vault = test_vault();
        let source = address_of(SECRET_A);
        let ledger = Arc::new(MockLedger::new().with_balance(source, 1_000_000));
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let record = sealed(&vault, SECRET_A, Some(source.to_string()));
        let destination = Pubkey::new_unique();
        let outcome = pipeline
            .run(1, &record, &destination, &Pubkey::new_unique())
            .await;

        assert!(outcome.status().is_success());
        assert_eq!(outcome.starting_balance(), 1_000_000);
        assert_eq!(
            ledger.sends(),
            vec![LedgerCall::Send {
                from: source,
                destination,
                amount: 1_000_000
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_balance_sends_nothing() {
        let vault = test_vault();
        let ledger = Arc::new(MockLedger::new());
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let record = sealed(&vault, SECRET_A, None);
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        assert_eq!(*outcome.status(), OutcomeStatus::EmptyBalance);
        assert_eq!(outcome.starting_balance(), 0);
        assert!(ledger.sends().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_record_is_undecryptable() {
        let vault = test_vault();
        let ledger = Arc::new(MockLedger::new());
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let mut record = sealed(&vault, SECRET_A, None);
        record.ciphertext[30] ^= 0xff;
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        assert_eq!(
            *outcome.status(),
            OutcomeStatus::Failure("undecryptable record".to_string())
        );
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_plaintext_is_failure() {
        let vault = test_vault();
        let ledger = Arc::new(MockLedger::new());
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let record = sealed(&vault, "not-a-secret", None);
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        match outcome.status() {
            OutcomeStatus::Failure(reason) => assert!(reason.starts_with("Invalid secret format")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cached_address_mismatch() {
        let vault = test_vault();
        let ledger = Arc::new(MockLedger::new().with_balance(address_of(SECRET_A), 10));
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let record = sealed(&vault, SECRET_A, Some(address_of(SECRET_B).to_string()));
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        assert_eq!(
            *outcome.status(),
            OutcomeStatus::Failure("stored address mismatch".to_string())
        );
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_starting_balance() {
        let vault = test_vault();
        let source = address_of(SECRET_A);
        let ledger = Arc::new(
            MockLedger::new()
                .with_balance(source, 42)
                .failing_send(source),
        );
        let pipeline = TransferPipeline::new(vault.clone(), ledger);

        let record = sealed(&vault, SECRET_A, None);
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        assert!(outcome.status().is_failure());
        assert_eq!(outcome.starting_balance(), 42);
        assert_eq!(outcome.address(), source.to_string());
    }

    #[tokio::test]
    async fn test_balance_failure_is_failure() {
        let vault = test_vault();
        let source = address_of(SECRET_A);
        let ledger = Arc::new(MockLedger::new().failing_balance(source));
        let pipeline = TransferPipeline::new(vault.clone(), ledger.clone());

        let record = sealed(&vault, SECRET_A, Some(source.to_string()));
        let outcome = pipeline
            .run(1, &record, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await;

        assert!(outcome.status().is_failure());
        assert_eq!(outcome.starting_balance(), 0);
        assert_eq!(outcome.address(), source.to_string());
        assert!(ledger.sends().is_empty());
    }

    #[test]
    fn test_failure_reason_classification() {
        assert_eq!(
            failure_reason(&Error::Authentication("tag mismatch".into())),
            "undecryptable record"
        );
        assert_eq!(
            failure_reason(&Error::Authentication(ADDRESS_MISMATCH.into())),
            ADDRESS_MISMATCH
        );
        assert_eq!(
            failure_reason(&Error::Ledger("timeout".into())),
            "Ledger error: timeout"
        );
        assert!(failure_reason(&Error::Internal("join".into())).starts_with("unexpected error"));
    }
}
