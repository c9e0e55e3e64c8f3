//! Mint account utilities
//!
//! Reads token decimals from SPL mint accounts and name/symbol from the
//! Metaplex metadata account, when the token has one.

use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

use crate::error::{Error, Result};

/// Metaplex token metadata program
pub const METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

// Mint account layout:
// - mint_authority: COption<Pubkey> (36 bytes: 4 + 32)
// - supply: u64 (8 bytes)
// - decimals: u8 (1 byte)
// - is_initialized: bool (1 byte)
// - freeze_authority: COption<Pubkey> (36 bytes)
const DECIMALS_OFFSET: usize = 44;
const IS_INITIALIZED_OFFSET: usize = 45;

/// Leading fields of a Metaplex metadata account
#[derive(BorshDeserialize)]
struct MetadataPrefix {
    _key: u8,
    _update_authority: [u8; 32],
    _mint: [u8; 32],
    name: String,
    symbol: String,
}

/// Read decimals from raw mint account data
pub fn decode_decimals(data: &[u8]) -> Result<u8> {
    if data.len() <= IS_INITIALIZED_OFFSET {
        return Err(Error::Ledger("Mint account data too short".to_string()));
    }
    if data[IS_INITIALIZED_OFFSET] == 0 {
        return Err(Error::Ledger("Mint account is not initialized".to_string()));
    }
    Ok(data[DECIMALS_OFFSET])
}

/// Reject mints not owned by the legacy SPL token program
///
/// Balances are read from legacy associated token accounts; a mint owned by
/// another program (Token-2022) would otherwise look like an empty balance.
pub fn ensure_token_program(mint: &Pubkey, program_owner: &Pubkey) -> Result<()> {
    if *program_owner != spl_token::id() {
        return Err(Error::Ledger(format!(
            "{} is not an SPL token mint (owner {})",
            mint, program_owner
        )));
    }
    Ok(())
}

/// Derive the Metaplex metadata account for a mint
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    let seeds: &[&[u8]] = &[b"metadata", METADATA_PROGRAM_ID.as_ref(), mint.as_ref()];
    Pubkey::find_program_address(seeds, &METADATA_PROGRAM_ID).0
}

/// Read (name, symbol) from raw Metaplex metadata account data
///
/// On-chain strings are padded with NUL bytes; padding is stripped.
pub fn decode_name_symbol(data: &[u8]) -> Result<(String, String)> {
    let prefix = MetadataPrefix::deserialize(&mut &data[..])
        .map_err(|e| Error::Ledger(format!("Metadata decode failed: {}", e)))?;

    Ok((clean(&prefix.name), clean(&prefix.symbol)))
}

fn clean(s: &str) -> String {
    s.trim_end_matches('\0').trim().to_string()
}
