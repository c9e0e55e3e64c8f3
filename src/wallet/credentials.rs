//! Credential management for custodied accounts
//!
//! Registers raw secrets as encrypted records, lists them, and manages the
//! owner's destination address.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::Mutex;
use tracing::info;
use zeroize::Zeroizing;

use crate::custody::{generate_salt, parse_address, resolve, SecretVault};
use crate::error::{Error, Result};
use crate::store::SecretStore;

use super::transfer::{failure_reason, log_failure, unlock_record};
use super::types::{AccountSummary, EncryptedSecretRecord, OwnerId};

/// Manages encrypted records and destinations for all owners
pub struct CredentialManager {
    store: Arc<dyn SecretStore>,
    vault: SecretVault,
    /// Held from the duplicate check until the record is stored
    register_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn SecretStore>, vault: SecretVault) -> Self {
        Self {
            store,
            vault,
            register_lock: Mutex::new(()),
        }
    }

    /// Encrypt and store a raw secret for `owner_id`
    ///
    /// The first record of an owner becomes the default. Returns the
    /// address recovered from the secret.
    ///
    /// Registrations through one manager are serialized, so concurrent calls
    /// cannot both pass the duplicate check or both claim the default slot.
    /// Separate managers sharing a store file are not coordinated.
    pub async fn register(&self, owner_id: OwnerId, raw_secret: &str) -> Result<Pubkey> {
        let raw_secret = Zeroizing::new(raw_secret.trim().to_string());
        let address = resolve(&raw_secret)?.address();
        let address_str = address.to_string();

        let _guard = self.register_lock.lock().await;

        let existing = self.store.get_records(owner_id).await?;
        if existing
            .iter()
            .any(|r| r.address.as_deref() == Some(address_str.as_str()))
        {
            return Err(Error::DuplicateAccount(address_str));
        }

        let salt = generate_salt();
        let vault = self.vault.clone();
        let ciphertext = tokio::task::spawn_blocking(move || vault.encrypt(&raw_secret, &salt))
            .await
            .map_err(|e| Error::Internal(format!("encrypt task failed: {}", e)))??;

        let record = EncryptedSecretRecord::new(
            owner_id,
            Some(address_str),
            ciphertext,
            salt.to_vec(),
            existing.is_empty(),
        );

        self.store.put_record(owner_id, record).await?;
        info!("Owner {}: registered account {}", owner_id, address);

        Ok(address)
    }

    /// Every record of an owner, with unusable ones flagged
    pub async fn list_accounts(&self, owner_id: OwnerId) -> Result<Vec<AccountSummary>> {
        let records = self.store.get_records(owner_id).await?;

        let mut accounts = Vec::with_capacity(records.len());
        for record in &records {
            let (address, problem) = match unlock_record(&self.vault, record).await {
                Ok(account) => (Some(account.address()), None),
                Err(e) => {
                    log_failure(owner_id, &record.label(), &e);
                    (None, Some(failure_reason(&e)))
                }
            };
            accounts.push(AccountSummary {
                record_id: record.id,
                address,
                is_default: record.is_default,
                created_at: record.created_at,
                problem,
            });
        }
        Ok(accounts)
    }

    /// Remove every record of an owner; the destination is kept
    pub async fn delete_all(&self, owner_id: OwnerId) -> Result<usize> {
        let removed = self.store.delete_records(owner_id).await?;
        info!("Owner {}: deleted {} records", owner_id, removed);
        Ok(removed)
    }

    /// Validate and upsert the owner's destination
    pub async fn set_destination(&self, owner_id: OwnerId, address: &str) -> Result<Pubkey> {
        let destination = parse_address(address)?;
        self.store
            .put_destination(owner_id, &destination.to_string())
            .await?;
        info!("Owner {}: destination set to {}", owner_id, destination);
        Ok(destination)
    }

    pub async fn destination(&self, owner_id: OwnerId) -> Result<Option<Pubkey>> {
        match self.store.get_destination(owner_id).await? {
            Some(stored) => parse_address(&stored).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use crate::testing::{address_of, test_vault, SECRET_A, SECRET_B};

    fn manager() -> (CredentialManager, Arc<JsonFileStore>) {
        let store = Arc::new(JsonFileStore::in_memory());
        (CredentialManager::new(store.clone(), test_vault()), store)
    }

    #[tokio::test]
    async fn test_register_first_is_default() {
        let (manager, store) = manager();

        let a = manager.register(1, SECRET_A).await.unwrap();
        let b = manager.register(1, SECRET_B).await.unwrap();
        assert_eq!(a, address_of(SECRET_A));
        assert_eq!(b, address_of(SECRET_B));

        let records = store.get_records(1).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_default);
        assert_eq!(records[0].address.as_deref(), Some(a.to_string().as_str()));
        assert!(!records[1].is_default);
    }

    #[tokio::test]
    async fn test_register_never_stores_plaintext() {
        let (manager, store) = manager();
        manager.register(1, SECRET_A).await.unwrap();

        let record = &store.get_records(1).await.unwrap()[0];
        let json = serde_json::to_string(record).unwrap();
        assert!(!json.contains(&SECRET_A[2..]));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate() {
        let (manager, _) = manager();
        manager.register(1, SECRET_A).await.unwrap();

        let result = manager.register(1, SECRET_A).await;
        assert!(matches!(result, Err(Error::DuplicateAccount(_))));

        // Same secret for another owner is a separate registration
        assert!(manager.register(2, SECRET_A).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_register_same_secret() {
        let (manager, store) = manager();

        let (first, second) = tokio::join!(
            manager.register(1, SECRET_A),
            manager.register(1, SECRET_A)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::DuplicateAccount(_)))));
        assert_eq!(store.get_records(1).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_register_single_default() {
        let (manager, store) = manager();

        let (first, second) = tokio::join!(
            manager.register(1, SECRET_A),
            manager.register(1, SECRET_B)
        );
        first.unwrap();
        second.unwrap();

        let records = store.get_records(1).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.is_default).count(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_format() {
        let (manager, store) = manager();
        let result = manager.register(1, "0x1234").await;
        assert!(matches!(result, Err(Error::InvalidSecretFormat(_))));
        assert!(store.get_records(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_flags_unusable_records() {
        let (manager, store) = manager();
        manager.register(1, SECRET_A).await.unwrap();
        store
            .put_record(
                1,
                EncryptedSecretRecord::new(1, None, vec![0; 64], vec![0; 16], false),
            )
            .await
            .unwrap();

        let accounts = manager.list_accounts(1).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().any(|a| a.address == Some(address_of(SECRET_A))));
        let broken = accounts.iter().find(|a| !a.is_usable()).unwrap();
        assert_eq!(broken.problem.as_deref(), Some("undecryptable record"));
    }

    #[tokio::test]
    async fn test_delete_all_keeps_destination() {
        let (manager, _) = manager();
        manager.register(1, SECRET_A).await.unwrap();
        let dest = Pubkey::new_unique();
        manager.set_destination(1, &dest.to_string()).await.unwrap();

        assert_eq!(manager.delete_all(1).await.unwrap(), 1);
        assert!(manager.list_accounts(1).await.unwrap().is_empty());
        assert_eq!(manager.destination(1).await.unwrap(), Some(dest));
    }

    #[tokio::test]
    async fn test_set_destination_validates() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.set_destination(1, "0xdeadbeef").await,
            Err(Error::InvalidAddress(_))
        ));
        assert_eq!(manager.destination(1).await.unwrap(), None);

        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        manager.set_destination(1, &first.to_string()).await.unwrap();
        manager.set_destination(1, &format!(" {} ", second)).await.unwrap();
        assert_eq!(manager.destination(1).await.unwrap(), Some(second));
    }
}
