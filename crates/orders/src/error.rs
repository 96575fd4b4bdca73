//! Order use-case errors.

use common::{OrderId, ProductId, UserId};
use domain::{DomainError, MAX_QUANTITY, Money, OrderStatus};
use order_store::StoreError;
use thiserror::Error;

use crate::services::DependencyFailure;

/// How a caller should treat an [`OrderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong; retrying it unchanged will fail again.
    BadRequest,
    /// A dependency could not answer; the request may be retried.
    Unavailable,
    /// The addressed order does not exist.
    NotFound,
    /// The order is not in a state that allows the operation.
    Conflict,
    /// Server-side fault.
    Internal,
}

/// Errors that can occur while creating or updating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    EmptyOrder,

    #[error("Invalid quantity for product {product_id}: {quantity} (must be between 1 and {max})", max = MAX_QUANTITY)]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Product {product_id} has an invalid price: {price}")]
    InvalidPrice { product_id: ProductId, price: Money },

    #[error("Order amount exceeds the supported range")]
    AmountOverflow,

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Users service unavailable while validating user {user_id}: {reason}")]
    UserUnavailable {
        user_id: UserId,
        reason: DependencyFailure,
    },

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Products service unavailable while validating product {product_id}: {reason}")]
    ProductUnavailable {
        product_id: ProductId,
        reason: DependencyFailure,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DomainError> for OrderError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::EmptyOrder => OrderError::EmptyOrder,
            DomainError::InvalidQuantity {
                product_id,
                quantity,
            } => OrderError::InvalidQuantity {
                product_id,
                quantity,
            },
            DomainError::InvalidPrice { product_id, price } => {
                OrderError::InvalidPrice { product_id, price }
            }
            DomainError::AmountOverflow => OrderError::AmountOverflow,
            other => OrderError::Domain(other),
        }
    }
}

impl OrderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            OrderError::EmptyOrder
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::AmountOverflow
            | OrderError::UserNotFound(_)
            | OrderError::ProductNotFound(_)
            | OrderError::InsufficientStock { .. } => ErrorClass::BadRequest,
            OrderError::UserUnavailable { .. } | OrderError::ProductUnavailable { .. } => {
                ErrorClass::Unavailable
            }
            OrderError::OrderNotFound(_) | OrderError::Storage(StoreError::OrderNotFound(_)) => {
                ErrorClass::NotFound
            }
            OrderError::InvalidStatusTransition { .. }
            | OrderError::Storage(StoreError::StatusConflict { .. }) => ErrorClass::Conflict,
            OrderError::Domain(_) | OrderError::Storage(_) | OrderError::Serialization(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Unavailable
    }

    /// Short label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::EmptyOrder => "empty_order",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::InvalidPrice { .. } => "invalid_price",
            OrderError::AmountOverflow => "amount_overflow",
            OrderError::UserNotFound(_) => "user_not_found",
            OrderError::UserUnavailable { .. } => "user_unavailable",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::ProductUnavailable { .. } => "product_unavailable",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::InvalidStatusTransition { .. } => "invalid_status_transition",
            OrderError::Domain(_) => "domain",
            OrderError::Storage(_) => "storage",
            OrderError::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
