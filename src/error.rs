//! Error types for the token sweeper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the token sweeper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Custody errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid secret format: {0}")]
    InvalidSecretFormat(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Account already registered: {0}")]
    DuplicateAccount(String),

    // Batch errors
    #[error("No destination address configured for owner {0}")]
    MissingDestination(i64),

    #[error("No accounts registered for owner {0}")]
    NoAccountsRegistered(i64),

    // Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error only affects a single stored record
    ///
    /// Record-scoped errors are converted into a failed outcome and never
    /// abort a batch.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::InvalidSecretFormat(_)
                | Error::Ledger(_)
                | Error::TransactionSend(_)
        )
    }

    /// Check if this error stops a batch before any account is touched
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Error::MissingDestination(_)
                | Error::NoAccountsRegistered(_)
                | Error::InvalidAddress(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Ledger(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
