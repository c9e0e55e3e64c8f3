//! Token Sweeper Library
//!
//! Custodies user-supplied account secrets and sweeps token balances from
//! every custodied account to one destination.

pub mod cli;
pub mod config;
pub mod custody;
pub mod error;
pub mod ledger;
pub mod store;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
