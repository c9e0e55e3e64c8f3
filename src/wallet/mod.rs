//! Custodied wallet operations
//!
//! Provides registration and sweeping of user-supplied accounts:
//! - Credential management (encrypted records, destination per owner)
//! - Per-account transfer pipeline
//! - Sequential, throttled, cancellable batches
//! - Read-only balance overviews
//!
//! # Architecture
//!
//! ```text
//! CredentialManager → SecretStore ← BatchOrchestrator → TransferPipeline → LedgerGateway
//!                                                              ↑
//!                                                         SecretVault
//! ```
//!
//! # Failure isolation
//!
//! Below the pipeline every problem becomes a [`TransferOutcome`]. Above it,
//! only a missing or invalid destination and an empty account list stop a
//! batch, and both are reported before any ledger call.

pub mod batch;
pub mod credentials;
pub mod outcome;
pub mod overview;
pub mod transfer;
pub mod types;

pub use batch::BatchOrchestrator;
pub use credentials::CredentialManager;
pub use outcome::{BatchReport, OutcomeStatus, TransferOutcome};
pub use overview::{AccountBalance, TokenBalances, WalletsOverview};
pub use transfer::TransferPipeline;
pub use types::{AccountSummary, EncryptedSecretRecord, OwnerId};
