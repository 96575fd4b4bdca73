//! Event payloads published through the outbox.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::money::{self, Money};
use crate::order::Order;

/// Event name of [`OrderCreated`].
pub const ORDER_CREATED: &str = "order.created";

/// Event name of [`OrderPaid`].
pub const ORDER_PAID: &str = "order.paid";

/// A payload that can be stored in the outbox under a fixed event name.
pub trait OutboxEvent: Serialize {
    const EVENT_TYPE: &'static str;
}

/// Emitted once per order, in the same transaction that stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(with = "money::major_units")]
    pub total: Money,
    pub timestamp: DateTime<Utc>,
}

impl OrderCreated {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id.clone(),
            total: order.total,
            timestamp: order.created_at,
        }
    }
}

impl OutboxEvent for OrderCreated {
    const EVENT_TYPE: &'static str = ORDER_CREATED;
}

/// Emitted when a simulated payment moves an order to `PAID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaid {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(with = "money::major_units")]
    pub total: Money,
    pub timestamp: DateTime<Utc>,
}

impl OrderPaid {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id.clone(),
            total: order.total,
            timestamp: clock::now(),
        }
    }
}

impl OutboxEvent for OrderPaid {
    const EVENT_TYPE: &'static str = ORDER_PAID;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderItem, PricingPolicy};
    use crate::outbox::OutboxEntry;

    #[test]
    fn test_order_created_payload_shape() {
        let order = Order::place(
            UserId::new("u1"),
            vec![OrderItem::new("p1", "Widget", 2, Money::from_dollars(10))],
            &PricingPolicy::default(),
            None,
            None,
        )
        .unwrap();

        let entry = OutboxEntry::for_event(&OrderCreated::from_order(&order)).unwrap();

        assert_eq!(entry.event_type, "order.created");
        assert_eq!(entry.payload["orderId"], order.id.to_string());
        assert_eq!(entry.payload["userId"], "u1");
        assert_eq!(entry.payload["total"], 20.0);
        assert!(entry.payload["timestamp"].is_string());
    }
}
