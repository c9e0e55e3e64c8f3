//! Envelope encryption for raw private keys
//!
//! Ciphertext layout: `nonce (24 bytes) || XChaCha20-Poly1305(plaintext) || tag (16 bytes)`.
//! The salt travels next to the ciphertext in the record; it is not secret.

use chacha20poly1305::aead::{Aead, NewAead};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

use super::kdf::{KeyDeriver, MIN_SALT_LEN};

/// XChaCha20 nonce length
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length
pub const TAG_LEN: usize = 16;

/// Salt length used for new records
pub const SALT_LEN: usize = 16;

/// Generate a fresh random salt for a new record
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts and decrypts private-key strings
///
/// Pure transform: owns no storage and keeps no plaintext.
#[derive(Debug, Clone)]
pub struct SecretVault {
    deriver: KeyDeriver,
}

impl SecretVault {
    pub fn new(deriver: KeyDeriver) -> Self {
        Self { deriver }
    }

    /// Encrypt a plaintext secret under the key derived from `salt`
    pub fn encrypt(&self, plaintext: &str, salt: &[u8]) -> Result<Vec<u8>> {
        let key = self.deriver.derive(salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let nonce = generate_nonce();

        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| Error::Internal("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt and authenticate a ciphertext produced by [`SecretVault::encrypt`]
    ///
    /// Any tampering, truncation or salt mismatch is an
    /// [`Error::Authentication`]; no partial plaintext is ever returned.
    pub fn decrypt(&self, ciphertext: &[u8], salt: &[u8]) -> Result<Zeroizing<String>> {
        if salt.len() < MIN_SALT_LEN {
            return Err(Error::Authentication(format!(
                "stored salt is {} bytes, expected at least {}",
                salt.len(),
                MIN_SALT_LEN
            )));
        }
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Authentication("ciphertext truncated".to_string()));
        }

        let key = self.deriver.derive(salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| Error::Authentication("authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|e| {
                let mut bytes = e.into_bytes();
                bytes.zeroize();
                Error::Authentication("decrypted secret is not valid UTF-8".to_string())
            })
    }
}
