//! Secret custody
//!
//! Encryption-at-rest for user-supplied private keys and their later use
//! for signing.
//!
//! # Architecture
//!
//! ```text
//! MasterSecret + salt → KeyDeriver → SecretVault ⇄ ciphertext
//!                                         ↓
//!                                  AccountResolver → Account (address + signer)
//! ```
//!
//! # Security
//!
//! - One random salt per stored record, so every record has its own key
//! - Authenticated encryption: tampered records fail, they never decrypt to garbage
//! - Plaintext and derived keys live in zeroizing buffers and are never logged

pub mod kdf;
pub mod resolver;
pub mod vault;

pub use kdf::{derive_key, KeyDeriver, MasterSecret};
pub use resolver::{parse_address, resolve, validate_secret_format, Account};
pub use vault::{generate_salt, SecretVault};
