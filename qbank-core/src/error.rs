//! Error taxonomy for question bank operations
//!
//! Every fallible public operation returns one of these kinds, so callers
//! can tell malformed input, a missing code, and an aborted transaction
//! apart without string matching.

use thiserror::Error;

/// Errors surfaced by question bank operations.
#[derive(Debug, Error)]
pub enum BankError {
    /// Malformed or missing input. The store is unchanged.
    #[error("invalid question data: {0}")]
    Validation(String),

    /// The referenced code does not exist. The store is unchanged.
    #[error("no question with code {0}")]
    NotFound(String),

    /// The delete+renumber unit aborted. All staged writes were discarded
    /// and the store is exactly as it was before the operation.
    #[error("delete and renumber aborted, store rolled back")]
    OperationFailed(#[source] anyhow::Error),

    /// Underlying storage fault (IO, parse, SQL).
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for BankError {
    fn from(err: rusqlite::Error) -> Self {
        BankError::Storage(err.into())
    }
}

impl BankError {
    /// Wraps a mid-transaction failure, preserving the cause.
    pub fn operation_failed(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        BankError::OperationFailed(anyhow::Error::new(cause))
    }
}
