//! Core types for custodied wallets
//!
//! Defines the stored encrypted record and the per-account listing entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

/// Opaque identity of an end user (chat user id)
pub type OwnerId = i64;

/// An encrypted private key as held by persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecretRecord {
    /// Unique record identifier
    pub id: Uuid,

    /// Owner of the secret
    pub owner_id: OwnerId,

    /// Cached address derived from the plaintext
    /// Checked against the decrypted secret at use time
    #[serde(default)]
    pub address: Option<String>,

    /// `nonce || ciphertext || tag`
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// Per-record KDF salt (not secret)
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,

    /// Default account is processed first in a batch
    #[serde(default)]
    pub is_default: bool,

    /// When the secret was registered
    pub created_at: DateTime<Utc>,
}

impl EncryptedSecretRecord {
    pub fn new(
        owner_id: OwnerId,
        address: Option<String>,
        ciphertext: Vec<u8>,
        salt: Vec<u8>,
        is_default: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            address,
            ciphertext,
            salt,
            is_default,
            created_at: Utc::now(),
        }
    }

    /// Label for reports when the address cannot be recovered
    pub fn label(&self) -> String {
        match &self.address {
            Some(address) => address.clone(),
            None => format!("record {}", self.id),
        }
    }
}

/// Order records for processing: default first, then most recently added
pub fn sort_for_batch(records: &mut [EncryptedSecretRecord]) {
    records.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// One registered account as shown to its owner
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub record_id: Uuid,
    /// Recovered address, `None` when the record is unusable
    pub address: Option<Pubkey>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    /// Why the record could not be opened
    pub problem: Option<String>,
}

impl AccountSummary {
    pub fn is_usable(&self) -> bool {
        self.problem.is_none()
    }
}

/// Serde helper storing byte vectors as standard base64 strings
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
