//! Persistence port
//!
//! The core only needs key-value style access keyed by owner: encrypted
//! records and one destination address per owner.

pub mod json;

use async_trait::async_trait;

use crate::error::Result;
use crate::wallet::types::{EncryptedSecretRecord, OwnerId};

pub use json::JsonFileStore;

/// Storage for encrypted records and destinations
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// All records of an owner, default first, then most recently added
    async fn get_records(&self, owner: OwnerId) -> Result<Vec<EncryptedSecretRecord>>;

    async fn put_record(&self, owner: OwnerId, record: EncryptedSecretRecord) -> Result<()>;

    /// Remove every record of an owner, returning how many were removed
    async fn delete_records(&self, owner: OwnerId) -> Result<usize>;

    async fn get_destination(&self, owner: OwnerId) -> Result<Option<String>>;

    /// Upsert the owner's destination; the previous value is discarded
    async fn put_destination(&self, owner: OwnerId, address: &str) -> Result<()>;
}
