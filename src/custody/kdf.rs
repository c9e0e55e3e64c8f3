//! Per-record key derivation
//!
//! Every stored secret gets its own AEAD key, derived from the process-wide
//! master secret and the record's random salt with PBKDF2-HMAC-SHA256.
//! The same (master secret, salt) pair always yields the same key, which is
//! what lets a later decrypt recover the original key from the stored salt.

use std::fmt;
use std::sync::Arc;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Length of a derived key in bytes (256-bit)
pub const KEY_LEN: usize = 32;

/// Minimum accepted salt length in bytes
pub const MIN_SALT_LEN: usize = 16;

/// PBKDF2 iteration floor; configuration may raise it, never lower it
pub const MIN_ITERATIONS: u32 = 100_000;

/// A derived symmetric key, wiped from memory on drop
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Process-wide master secret
///
/// Supplied once at startup and shared read-only for the lifetime of the
/// process. Never persisted, never logged.
pub struct MasterSecret(Zeroizing<Vec<u8>>);

impl MasterSecret {
    /// Wrap raw master secret bytes
    ///
    /// Fails if the secret is empty: a key derived from an empty secret is
    /// predictable.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.is_empty() {
            return Err(Error::Config("master secret is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Read the master secret from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = Zeroizing::new(
            std::env::var(var).map_err(|_| Error::MissingEnvVar(var.to_string()))?,
        );
        if value.trim().is_empty() {
            return Err(Error::Config(format!("{} is set but empty", var)));
        }
        Self::new(value.as_bytes())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from a master secret and a salt
pub fn derive_key(master_secret: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    if master_secret.is_empty() {
        return Err(Error::Config("master secret is empty".to_string()));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(Error::Config(format!(
            "salt must be at least {} bytes, got {}",
            MIN_SALT_LEN,
            salt.len()
        )));
    }
    if iterations < MIN_ITERATIONS {
        return Err(Error::Config(format!(
            "kdf iterations must be at least {}, got {}",
            MIN_ITERATIONS, iterations
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(master_secret, salt, iterations, &mut key[..]);
    Ok(key)
}

/// Derives per-record keys from the shared master secret
#[derive(Clone)]
pub struct KeyDeriver {
    master: Arc<MasterSecret>,
    iterations: u32,
}

impl KeyDeriver {
    /// Create a key deriver
    pub fn new(master: Arc<MasterSecret>, iterations: u32) -> Result<Self> {
        if iterations < MIN_ITERATIONS {
            return Err(Error::Config(format!(
                "kdf iterations must be at least {}, got {}",
                MIN_ITERATIONS, iterations
            )));
        }
        Ok(Self { master, iterations })
    }

    /// Derive the key for one record's salt
    pub fn derive(&self, salt: &[u8]) -> Result<DerivedKey> {
        derive_key(self.master.expose(), salt, self.iterations)
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}
