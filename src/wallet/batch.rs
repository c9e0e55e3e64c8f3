//! Batch orchestration
//!
//! Runs the transfer pipeline over every account of one owner, strictly in
//! sequence, with a fixed pause between accounts.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::custody::parse_address;
use crate::error::{Error, Result};
use crate::ledger::{LedgerGateway, TokenMetadata};
use crate::store::SecretStore;

use super::outcome::BatchReport;
use super::transfer::TransferPipeline;
use super::types::{EncryptedSecretRecord, OwnerId};

/// Default pause between two accounts of a batch
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);

/// Sweeps all accounts of an owner to the owner's destination
pub struct BatchOrchestrator {
    store: Arc<dyn SecretStore>,
    pipeline: TransferPipeline,
    throttle: Duration,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn SecretStore>, pipeline: TransferPipeline) -> Self {
        Self {
            store,
            pipeline,
            throttle: DEFAULT_THROTTLE,
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub(crate) fn store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    pub(crate) fn pipeline(&self) -> &TransferPipeline {
        &self.pipeline
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn LedgerGateway> {
        self.pipeline.ledger()
    }

    /// Run a full batch that cannot be cancelled
    pub async fn run_batch(&self, owner_id: OwnerId, token: &str) -> Result<BatchReport> {
        self.run_batch_with_cancel(owner_id, token, &CancellationToken::new())
            .await
    }

    /// Run a batch, stopping early when `cancel` fires
    ///
    /// Cancellation is observed before each account and during each pause.
    /// A transfer already in flight is allowed to finish. A cancelled batch
    /// still returns the outcomes gathered so far.
    pub async fn run_batch_with_cancel(
        &self,
        owner_id: OwnerId,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let (token, destination, records) = match self.prepare(owner_id, token).await {
            Ok(prepared) => prepared,
            Err(e) => {
                if e.is_batch_fatal() {
                    warn!("Owner {}: batch not started: {}", owner_id, e);
                } else {
                    error!("Owner {}: batch not started: {}", owner_id, e);
                }
                return Err(e);
            }
        };
        let metadata = self.fetch_metadata(&token).await;

        info!(
            "Owner {}: sweeping {} accounts of {} to {}",
            owner_id,
            records.len(),
            token,
            destination
        );

        let mut report = BatchReport::new(owner_id, &token, metadata);

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                report.mark_cancelled();
                break;
            }

            if i > 0 && !self.throttle.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.mark_cancelled();
                        break;
                    }
                    _ = tokio::time::sleep(self.throttle) => {}
                }
            }

            debug!("Owner {}: account {}/{}", owner_id, i + 1, records.len());
            let outcome = self
                .pipeline
                .run(owner_id, record, &destination, &token)
                .await;
            report.push(outcome);
        }

        if report.cancelled() {
            warn!(
                "Owner {}: batch cancelled after {} of {} accounts",
                owner_id,
                report.outcomes().len(),
                records.len()
            );
        }
        info!("Owner {}: {}", owner_id, report.summary());

        Ok(report)
    }

    /// Checks that run before any ledger call, in a fixed order
    async fn prepare(
        &self,
        owner_id: OwnerId,
        token: &str,
    ) -> Result<(Pubkey, Pubkey, Vec<EncryptedSecretRecord>)> {
        let token = parse_address(token)?;
        let destination = self.destination_for(owner_id).await?;
        let records = self.records_for(owner_id).await?;
        Ok((token, destination, records))
    }

    /// Stored destination of an owner, parsed
    pub(crate) async fn destination_for(&self, owner_id: OwnerId) -> Result<Pubkey> {
        let stored = self
            .store
            .get_destination(owner_id)
            .await?
            .ok_or(Error::MissingDestination(owner_id))?;
        parse_address(&stored)
    }

    pub(crate) async fn records_for(&self, owner_id: OwnerId) -> Result<Vec<EncryptedSecretRecord>> {
        let records = self.store.get_records(owner_id).await?;
        if records.is_empty() {
            return Err(Error::NoAccountsRegistered(owner_id));
        }
        Ok(records)
    }

    /// Metadata is for display only; a lookup failure leaves amounts raw
    pub(crate) async fn fetch_metadata(&self, token: &Pubkey) -> Option<TokenMetadata> {
        match self.ledger().get_token_metadata(token).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Token metadata unavailable for {}: {}", token, e);
                None
            }
        }
    }
}
