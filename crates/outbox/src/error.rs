//! Outbox error types.

use order_store::StoreError;
use thiserror::Error;

/// A broker refused or could not take a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The broker could not be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker rejected the message.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Errors that abort a whole sweep.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
