//! Order records.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderStatus, PricingPolicy};
use crate::clock;
use crate::error::DomainError;
use crate::money::Money;

/// Largest quantity a single order line may carry. Quantities are stored in
/// a signed 32-bit column.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// An item in an order.
///
/// `price` is the unit price captured when the order was placed, not a live
/// reference to the product's current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name at order time.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit in cents.
    pub price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            price,
        }
    }

    /// Returns quantity * unit price.
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.price
            .checked_mul(self.quantity)
            .ok_or(DomainError::AmountOverflow)
    }
}

/// A placed order with its items and frozen amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new `Pending` order, computing and freezing its amounts.
    ///
    /// Fails if `items` is empty, a quantity is zero or above
    /// [`MAX_QUANTITY`], a unit price is negative, or an amount overflows.
    pub fn place(
        user_id: UserId,
        items: Vec<OrderItem>,
        pricing: &PricingPolicy,
        shipping_address: Option<serde_json::Value>,
        payment_method: Option<String>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        for item in &items {
            if !(1..=MAX_QUANTITY).contains(&item.quantity) {
                return Err(DomainError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                });
            }
            if item.price.is_negative() {
                return Err(DomainError::InvalidPrice {
                    product_id: item.product_id.clone(),
                    price: item.price,
                });
            }
        }

        let mut subtotal = Money::zero();
        for item in &items {
            subtotal = subtotal
                .checked_add(item.line_total()?)
                .ok_or(DomainError::AmountOverflow)?;
        }
        let quote = pricing.quote(subtotal)?;
        let now = clock::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            items,
            subtotal: quote.subtotal,
            tax: quote.tax,
            shipping_cost: quote.shipping_cost,
            total: quote.total,
            status: OrderStatus::Pending,
            shipping_address,
            payment_method,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the total number of units across all items.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Moves the order to `next`, enforcing the lifecycle rules.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        self.status.ensure_transition(next)?;
        self.status = next;
        self.updated_at = clock::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: u32) -> OrderItem {
        OrderItem::new("p1", "Widget", quantity, Money::from_dollars(10))
    }

    #[test]
    fn test_place_computes_frozen_amounts() {
        let order = Order::place(
            UserId::new("u1"),
            vec![widget(2), OrderItem::new("p2", "Gadget", 1, Money::from_cents(250))],
            &PricingPolicy::default(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.subtotal, Money::from_cents(2250));
        assert_eq!(order.total, order.subtotal);
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_place_rejects_empty_orders() {
        let result = Order::place(
            UserId::new("u1"),
            vec![],
            &PricingPolicy::default(),
            None,
            None,
        );
        assert_eq!(result, Err(DomainError::EmptyOrder));
    }

    #[test]
    fn test_place_rejects_zero_quantity() {
        let result = Order::place(
            UserId::new("u1"),
            vec![widget(1), widget(0)],
            &PricingPolicy::default(),
            None,
            None,
        );
        assert!(matches!(
            result,
            Err(DomainError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_place_rejects_quantity_above_storage_range() {
        let result = Order::place(
            UserId::new("u1"),
            vec![widget(MAX_QUANTITY + 1)],
            &PricingPolicy::default(),
            None,
            None,
        );
        assert!(matches!(result, Err(DomainError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_place_rejects_negative_price() {
        let result = Order::place(
            UserId::new("u1"),
            vec![OrderItem::new("p1", "Widget", 1, Money::from_cents(-1))],
            &PricingPolicy::default(),
            None,
            None,
        );
        assert!(matches!(result, Err(DomainError::InvalidPrice { .. })));
    }

    #[test]
    fn test_place_rejects_overflowing_amounts() {
        let huge = Money::from_cents(i64::MAX / 2);
        for items in [
            vec![OrderItem::new("p1", "Widget", 3, huge)],
            vec![
                OrderItem::new("p1", "Widget", 1, huge),
                OrderItem::new("p2", "Gadget", 1, huge),
                OrderItem::new("p3", "Gizmo", 1, huge),
            ],
        ] {
            let result = Order::place(
                UserId::new("u1"),
                items,
                &PricingPolicy::default(),
                None,
                None,
            );
            assert_eq!(result, Err(DomainError::AmountOverflow));
        }
    }

    #[test]
    fn test_transition_keeps_amounts_and_created_at() {
        let mut order = Order::place(
            UserId::new("u1"),
            vec![widget(1)],
            &PricingPolicy::default(),
            None,
            Some("Credit Card".to_string()),
        )
        .unwrap();
        let created_at = order.created_at;
        let total = order.total;

        order.transition_to(OrderStatus::Paid).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.created_at, created_at);
        assert_eq!(order.total, total);

        assert!(order.transition_to(OrderStatus::Paid).is_err());
    }
}
