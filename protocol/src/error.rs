//! Error types for the spend core.
//!
//! Every operation that can fail returns a [`SpendError`]. The variants map
//! one-to-one onto the rejections an application handler shows the user;
//! none of them is retried inside the core.

use thiserror::Error;

/// Errors produced while selecting, building, signing, or queueing a spend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpendError {
    /// The key's spendable outputs do not cover outputs plus fee.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Total input value needed (outputs + fee).
        required: u64,
        /// Total value that was available.
        available: u64,
    },

    /// A data-embed payload exceeds the fee policy's size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Length of the offending payload.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The signing key does not control an input's locking script.
    #[error("authorization failure: {0}")]
    AuthorizationFailure(String),

    /// The spendable-output index could not be read or updated.
    #[error("output store unavailable: {0}")]
    StoreUnavailable(String),

    /// The broadcast queue refused the transaction.
    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    /// The transaction or one of its scripts is malformed.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// An address failed base58check decoding or has the wrong shape.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Convenience alias used throughout the crate.
pub type SpendResult<T> = Result<T, SpendError>;

impl From<sled::Error> for SpendError {
    fn from(err: sled::Error) -> Self {
        SpendError::StoreUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for SpendError {
    fn from(err: bincode::Error) -> Self {
        SpendError::StoreUnavailable(format!("corrupt output record: {err}"))
    }
}
