use common::{OrderId, OutboxId};
use domain::{DomainError, OrderStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this id was already stored.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The outbox entry does not exist.
    #[error("Outbox entry not found: {0}")]
    OutboxEntryNotFound(OutboxId),

    /// A compare-and-set status update found a different status.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A stored row could not be mapped back to a domain record.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
