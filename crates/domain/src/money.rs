//! Monetary amounts in minor units.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Serializes as a bare integer number of cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new Money amount from a whole dollar value.
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Converts a decimal major-unit amount (e.g. `29.99`) to cents, rounding
    /// to the nearest cent.
    ///
    /// Remote services report prices as JSON numbers; this is the only place
    /// a float is accepted. Returns `None` for NaN, infinities and amounts
    /// outside the range of `i64` cents.
    pub fn from_major_units(amount: f64) -> Option<Self> {
        let cents = (amount * 100.0).round();
        // i64::MAX is not representable as f64; 2^63 is the first value out of range.
        if !cents.is_finite() || cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion (whole number).
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub const fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Applies a rate expressed in basis points (1/100 of a percent),
    /// rounding half away from zero. `None` if the result does not fit.
    pub fn checked_basis_points(&self, bps: u32) -> Option<Money> {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        i64::try_from(rounded).ok().map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

/// Serde adapter writing money as a decimal number of major units
/// (`20.0` for 2000 cents), for payloads read by services that expect
/// prices as plain numbers.
pub mod major_units {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Money;

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(money.cents() as f64 / 100.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Money::from_major_units(amount)
            .ok_or_else(|| D::Error::custom(format!("amount out of range: {amount}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_dollars() {
        let money = Money::from_dollars(50);
        assert_eq!(money.cents(), 5000);
        assert_eq!(money.dollars(), 50);
        assert_eq!(money.cents_part(), 0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_from_major_units_rounds_to_cent() {
        assert_eq!(Money::from_major_units(29.99), Some(Money::from_cents(2999)));
        assert_eq!(Money::from_major_units(10.0), Some(Money::from_cents(1000)));
        assert_eq!(Money::from_major_units(0.125), Some(Money::from_cents(13)));
    }

    #[test]
    fn test_from_major_units_rejects_out_of_range() {
        assert_eq!(Money::from_major_units(f64::NAN), None);
        assert_eq!(Money::from_major_units(f64::INFINITY), None);
        assert_eq!(Money::from_major_units(1e17), None);
        assert_eq!(Money::from_major_units(-1e17), None);
        assert!(Money::from_major_units(1e15).is_some());
    }

    #[test]
    fn test_basis_points_rounding() {
        // 10% of $19.99 = 199.9 cents -> 200
        assert_eq!(Money::from_cents(1999).checked_basis_points(1000), Some(Money::from_cents(200)));
        // 10% of $0.04 = 0.4 cents -> 0
        assert_eq!(Money::from_cents(4).checked_basis_points(1000), Some(Money::zero()));
        assert_eq!(Money::from_cents(5).checked_basis_points(1000), Some(Money::from_cents(1)));
        assert_eq!(Money::from_dollars(100).checked_basis_points(0), Some(Money::zero()));
        assert_eq!(Money::from_cents(i64::MAX).checked_basis_points(20_000), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        let line = Money::from_cents(1000).checked_mul(2).unwrap();
        assert_eq!(line.checked_add(Money::from_cents(250)), Some(Money::from_cents(2250)));

        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }

    #[test]
    fn test_serializes_as_integer_cents() {
        let json = serde_json::to_string(&Money::from_dollars(20)).unwrap();
        assert_eq!(json, "2000");
    }

    #[test]
    fn test_major_units_adapter() {
        #[derive(Serialize, Deserialize)]
        struct Payload {
            #[serde(with = "major_units")]
            total: Money,
        }

        let json = serde_json::to_value(Payload {
            total: Money::from_cents(2499),
        })
        .unwrap();
        assert_eq!(json["total"], 24.99);

        let back: Payload = serde_json::from_value(serde_json::json!({"total": 20})).unwrap();
        assert_eq!(back.total, Money::from_dollars(20));

        assert!(serde_json::from_value::<Payload>(serde_json::json!({"total": 1e300})).is_err());
    }
}
