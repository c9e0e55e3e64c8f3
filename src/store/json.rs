//! JSON file store
//!
//! Keeps everything in memory behind a lock and rewrites the backing file
//! after each mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::wallet::types::{sort_for_batch, EncryptedSecretRecord, OwnerId};

use super::SecretStore;

const STORE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreData {
    version: String,
    #[serde(default)]
    records: BTreeMap<OwnerId, Vec<EncryptedSecretRecord>>,
    #[serde(default)]
    destinations: BTreeMap<OwnerId, String>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            records: BTreeMap::new(),
            destinations: BTreeMap::new(),
        }
    }
}

/// File-backed [`SecretStore`]
pub struct JsonFileStore {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
}

impl JsonFileStore {
    /// Open a store at `path`, starting empty if the file does not exist
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            let data: StoreData = serde_json::from_str(&content)
                .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;

            let total: usize = data.records.values().map(Vec::len).sum();
            info!("Loaded {} encrypted records from {}", total, path.display());
            data
        } else {
            info!("Store {} not found, starting empty", path.display());
            StoreData::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
        })
    }

    /// A store without a backing file
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            path: None,
        }
    }

    /// Write `staged` to disk, then make it the visible state
    ///
    /// On a failed write the visible state is left untouched.
    async fn commit(&self, current: &mut StoreData, staged: StoreData) -> Result<()> {
        self.persist(&staged).await?;
        *current = staged;
        Ok(())
    }

    async fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;

        debug!("Saved store to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl SecretStore for JsonFileStore {
    async fn get_records(&self, owner: OwnerId) -> Result<Vec<EncryptedSecretRecord>> {
        let data = self.data.read().await;
        let mut records = data.records.get(&owner).cloned().unwrap_or_default();
        sort_for_batch(&mut records);
        Ok(records)
    }

    async fn put_record(&self, owner: OwnerId, record: EncryptedSecretRecord) -> Result<()> {
        if record.owner_id != owner {
            return Err(Error::Storage(format!(
                "record {} belongs to owner {}, not {}",
                record.id, record.owner_id, owner
            )));
        }

        let mut data = self.data.write().await;
        if data
            .records
            .get(&owner)
            .is_some_and(|records| records.iter().any(|r| r.id == record.id))
        {
            return Err(Error::Storage(format!("record {} already stored", record.id)));
        }

        let mut staged = data.clone();
        staged.records.entry(owner).or_default().push(record);
        self.commit(&mut data, staged).await
    }

    async fn delete_records(&self, owner: OwnerId) -> Result<usize> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        let removed = staged.records.remove(&owner).map_or(0, |r| r.len());
        if removed > 0 {
            self.commit(&mut data, staged).await?;
        }
        Ok(removed)
    }

    async fn get_destination(&self, owner: OwnerId) -> Result<Option<String>> {
        Ok(self.data.read().await.destinations.get(&owner).cloned())
    }

    async fn put_destination(&self, owner: OwnerId, address: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        staged.destinations.insert(owner, address.to_string());
        self.commit(&mut data, staged).await
    }
}
