//! Tax and shipping rules applied when an order is placed.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Pricing rules applied to an order subtotal.
///
/// The default policy charges neither tax nor shipping, so the total equals
/// the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,

    /// Shipping charged on orders below the free-shipping threshold.
    pub flat_shipping: Money,

    /// Orders with a subtotal strictly above this amount ship for free.
    pub free_shipping_threshold: Option<Money>,
}

/// The four frozen amounts of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
}

impl PricingPolicy {
    /// Computes tax, shipping and total for a subtotal.
    pub fn quote(&self, subtotal: Money) -> Result<PriceBreakdown, DomainError> {
        let tax = subtotal
            .checked_basis_points(self.tax_rate_bps)
            .ok_or(DomainError::AmountOverflow)?;
        let shipping_cost = match self.free_shipping_threshold {
            Some(threshold) if subtotal > threshold => Money::zero(),
            _ => self.flat_shipping,
        };
        let total = subtotal
            .checked_add(tax)
            .and_then(|amount| amount.checked_add(shipping_cost))
            .ok_or(DomainError::AmountOverflow)?;

        Ok(PriceBreakdown {
            subtotal,
            tax,
            shipping_cost,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_total_is_subtotal() {
        let quote = PricingPolicy::default().quote(Money::from_dollars(20)).unwrap();
        assert_eq!(quote.total, Money::from_dollars(20));
        assert!(quote.tax.is_zero());
        assert!(quote.shipping_cost.is_zero());
    }

    #[test]
    fn test_tax_and_shipping() {
        let policy = PricingPolicy {
            tax_rate_bps: 1000,
            flat_shipping: Money::from_cents(999),
            free_shipping_threshold: Some(Money::from_dollars(100)),
        };

        let small = policy.quote(Money::from_dollars(50)).unwrap();
        assert_eq!(small.tax, Money::from_dollars(5));
        assert_eq!(small.shipping_cost, Money::from_cents(999));
        assert_eq!(small.total, Money::from_cents(5000 + 500 + 999));

        // Exactly at the threshold still pays shipping.
        let edge = policy.quote(Money::from_dollars(100)).unwrap();
        assert_eq!(edge.shipping_cost, Money::from_cents(999));

        let large = policy.quote(Money::from_cents(10001)).unwrap();
        assert!(large.shipping_cost.is_zero());
        assert_eq!(large.total, Money::from_cents(10001 + 1000));
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let policy = PricingPolicy {
            tax_rate_bps: 1000,
            ..Default::default()
        };
        assert_eq!(
            policy.quote(Money::from_cents(i64::MAX - 10)),
            Err(DomainError::AmountOverflow)
        );
    }
}
