//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::money::Money;
use crate::order::{MAX_QUANTITY, OrderStatus};

/// Violations of the order rules enforced while building domain records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An order needs at least one item.
    #[error("Order has no items")]
    EmptyOrder,

    /// Quantities must be positive and fit the storage column.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be between 1 and {max})", max = MAX_QUANTITY)]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Unit prices may not be negative.
    #[error("Invalid price for product {product_id}: {price}")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// A line total, subtotal, tax or total does not fit in `i64` cents.
    #[error("Order amount exceeds the supported range")]
    AmountOverflow,

    /// The requested status change is not part of the order lifecycle.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A persisted status string did not match any known status.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}
