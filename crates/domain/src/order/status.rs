//! Order status lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// Orders are always created `Pending`. Later transitions are driven by
/// payment and fulfillment:
/// ```text
/// Pending ──► Processing ──► Paid ──► Shipped ──► Delivered
///    │            │           │
///    └────────────┴───────────┴──► Cancelled / Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been placed and awaits payment.
    #[default]
    Pending,

    /// Payment has been authorized but not captured.
    Processing,

    /// Payment captured.
    Paid,

    /// Handed to the carrier.
    Shipped,

    /// Delivered to the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,

    /// Payment was returned (terminal state).
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Returns true if a payment may be recorded in this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Checks that moving to `next` is allowed.
    pub fn ensure_transition(self, next: OrderStatus) -> Result<(), DomainError> {
        let allowed = match next {
            OrderStatus::Pending => false,
            OrderStatus::Processing => self == OrderStatus::Pending,
            OrderStatus::Paid => self.can_pay(),
            OrderStatus::Shipped => self == OrderStatus::Paid,
            OrderStatus::Delivered => self == OrderStatus::Shipped,
            OrderStatus::Cancelled => matches!(
                self,
                OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Paid
            ),
            OrderStatus::Refunded => matches!(
                self,
                OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
            ),
        };

        if allowed {
            Ok(())
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}
