//! Test doubles shared by unit tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;

use crate::custody::kdf::{KeyDeriver, MasterSecret, MIN_ITERATIONS};
use crate::custody::SecretVault;
use crate::error::{Error, Result};
use crate::ledger::{LedgerGateway, TokenMetadata};

pub const SECRET_A: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const SECRET_B: &str = "0x8da4ef21b864d2cc526dbdb2a120bd2874c36c9d0a1fb7f8c63d7f7a8b41de8f";
pub const SECRET_C: &str = "0xc5f1b2a9d3e47f8061a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708";

pub fn test_vault() -> SecretVault {
    let master = Arc::new(MasterSecret::new("test-master-secret").unwrap());
    SecretVault::new(KeyDeriver::new(master, MIN_ITERATIONS).unwrap())
}

pub fn address_of(secret: &str) -> Pubkey {
    crate::custody::resolve(secret).unwrap().address()
}

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Balance(Pubkey),
    Metadata(Pubkey),
    NativeBalance(Pubkey),
    Send {
        from: Pubkey,
        destination: Pubkey,
        amount: u64,
    },
}

/// Scripted [`LedgerGateway`]
///
/// Unscripted addresses have a zero balance.
#[derive(Default)]
pub struct MockLedger {
    balances: HashMap<Pubkey, u64>,
    native_balances: HashMap<Pubkey, u64>,
    failing_balances: HashSet<Pubkey>,
    failing_sends: HashSet<Pubkey>,
    metadata: Option<TokenMetadata>,
    calls: Mutex<Vec<LedgerCall>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, owner: Pubkey, amount: u64) -> Self {
        self.balances.insert(owner, amount);
        self
    }

    pub fn with_native_balance(mut self, owner: Pubkey, lamports: u64) -> Self {
        self.native_balances.insert(owner, lamports);
        self
    }

    pub fn failing_balance(mut self, owner: Pubkey) -> Self {
        self.failing_balances.insert(owner);
        self
    }

    pub fn failing_send(mut self, owner: Pubkey) -> Self {
        self.failing_sends.insert(owner);
        self
    }

    pub fn with_metadata(mut self, metadata: TokenMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<LedgerCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, LedgerCall::Send { .. }))
            .collect()
    }

    fn record(&self, call: LedgerCall) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.len()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn get_balance(&self, owner: &Pubkey, _token: &Pubkey) -> Result<u64> {
        self.record(LedgerCall::Balance(*owner));
        if self.failing_balances.contains(owner) {
            return Err(Error::Ledger("balance query timed out".to_string()));
        }
        Ok(self.balances.get(owner).copied().unwrap_or(0))
    }

    async fn get_token_metadata(&self, token: &Pubkey) -> Result<TokenMetadata> {
        self.record(LedgerCall::Metadata(*token));
        self.metadata
            .clone()
            .ok_or_else(|| Error::Ledger("metadata unavailable".to_string()))
    }

    async fn get_native_balance(&self, address: &Pubkey) -> Result<u64> {
        self.record(LedgerCall::NativeBalance(*address));
        if self.failing_balances.contains(address) {
            return Err(Error::Ledger("balance query timed out".to_string()));
        }
        Ok(self.native_balances.get(address).copied().unwrap_or(0))
    }

    async fn sign_and_send(
        &self,
        signer: &Keypair,
        _token: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<Signature> {
        let from = signer.pubkey();
        let n = self.record(LedgerCall::Send {
            from,
            destination: *destination,
            amount,
        });
        if self.failing_sends.contains(&from) {
            return Err(Error::TransactionSend("blockhash expired".to_string()));
        }
        Ok(Signature::from([n as u8; 64]))
    }
}
