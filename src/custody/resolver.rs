//! Account reconstruction from decrypted secrets
//!
//! A raw secret is `0x` followed by exactly 64 hex digits: the 32-byte
//! ed25519 seed of a Solana account. Format is checked before any key
//! material is built.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::keypair::keypair_from_seed;
use solana_sdk::signer::Signer;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Prefix every raw secret must carry
pub const SECRET_PREFIX: &str = "0x";

/// Total length of a raw secret including the prefix
pub const SECRET_LEN: usize = 66;

static SECRET_FORMAT: OnceLock<Regex> = OnceLock::new();

fn secret_format() -> &'static Regex {
    SECRET_FORMAT.get_or_init(|| {
        Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("Invalid secret format regex")
    })
}

/// A signable account rebuilt from a raw secret
///
/// Holds the signing keypair; drop it as soon as the operation that needed
/// it is done.
pub struct Account {
    address: Pubkey,
    signer: Keypair,
}

impl Account {
    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn signer(&self) -> &Keypair {
        &self.signer
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Check a raw secret against the expected format without building a key
///
/// Error messages describe the shape of the input, never its content.
pub fn validate_secret_format(raw_secret: &str) -> Result<()> {
    if raw_secret.is_empty() {
        return Err(Error::InvalidSecretFormat("secret is empty".to_string()));
    }
    if !raw_secret.starts_with(SECRET_PREFIX) {
        return Err(Error::InvalidSecretFormat(format!(
            "secret must start with '{}'",
            SECRET_PREFIX
        )));
    }
    if raw_secret.len() != SECRET_LEN {
        return Err(Error::InvalidSecretFormat(format!(
            "secret must be {} characters, got {}",
            SECRET_LEN,
            raw_secret.len()
        )));
    }
    if !secret_format().is_match(raw_secret) {
        return Err(Error::InvalidSecretFormat(
            "secret contains non-hex characters".to_string(),
        ));
    }
    Ok(())
}

/// Rebuild a signable account from a raw secret
pub fn resolve(raw_secret: &str) -> Result<Account> {
    validate_secret_format(raw_secret)?;

    let mut seed = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(&raw_secret[SECRET_PREFIX.len()..], &mut seed[..])
        .map_err(|_| Error::InvalidSecretFormat("secret is not valid hex".to_string()))?;

    let signer = keypair_from_seed(&seed[..])
        .map_err(|_| Error::InvalidSecretFormat("secret is not a valid ed25519 seed".to_string()))?;

    Ok(Account {
        address: signer.pubkey(),
        signer,
    })
}

/// Parse and validate a base58 account or mint address
pub fn parse_address(address: &str) -> Result<Pubkey> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidAddress("address is empty".to_string()));
    }
    Pubkey::from_str(trimmed).map_err(|e| Error::InvalidAddress(format!("{}: {}", trimmed, e)))
}
