//! Error types for the pension ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input (amount below minimum, self-transfer, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Transfer or withdrawal exceeds the caller's available funds
    #[error("Insufficient balance: {available} available")]
    InsufficientBalance {
        /// Funds the caller can actually spend
        available: Decimal,
    },

    /// Emergency withdrawal exceeds the 50% cap
    #[error("Withdrawal cap exceeded: at most {cap} of {available} available")]
    WithdrawalCapExceeded {
        /// Maximum amount that may be withdrawn right now
        cap: Decimal,
        /// Current available balance the cap was computed from
        available: Decimal,
    },

    /// Unknown user, employer, or recipient
    #[error("Not found: {0}")]
    NotFound(String),

    /// Email already registered to another account
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Invariant violation (unpaired transfer entry, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
