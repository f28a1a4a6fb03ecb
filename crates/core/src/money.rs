//! Minor-unit price arithmetic.
//!
//! All amounts are integers in the currency's smallest unit (e.g. cents).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A whole-number percentage in `0..=100`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    /// The identity percentage: applying it changes nothing.
    pub const ZERO: Percent = Percent(0);

    pub fn new(value: u8) -> DomainResult<Self> {
        if value > 100 {
            return Err(DomainError::validation("percent must be within 0..=100"));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether applying this percentage actually lowers a price.
    ///
    /// A 0% discount leaves the base price unchanged; 100% is a valid
    /// (free-of-charge) discount.
    pub fn is_discounting(self) -> bool {
        self.0 > 0
    }
}

impl ValueObject for Percent {}

impl core::fmt::Display for Percent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Apply a percentage discount to a minor-unit price.
///
/// Returns `base_cents × (1 − percent/100)` rounded half-up to the minor
/// unit. A non-discounting percent returns the base price unchanged.
pub fn discounted_unit_price(base_cents: u64, percent: Percent) -> u64 {
    if !percent.is_discounting() {
        return base_cents;
    }
    let keep = u128::from(100 - percent.value());
    let scaled = u128::from(base_cents) * keep + 50;
    (scaled / 100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percent_rejects_values_above_hundred() {
        assert!(Percent::new(101).is_err());
        assert!(Percent::new(100).is_ok());
        assert!(Percent::new(0).is_ok());
    }

    #[test]
    fn zero_percent_leaves_price_unchanged() {
        let p = Percent::new(0).unwrap();
        assert_eq!(discounted_unit_price(9_99, p), 9_99);
    }

    #[test]
    fn full_discount_prices_at_zero() {
        let p = Percent::new(100).unwrap();
        assert_eq!(discounted_unit_price(9_99, p), 0);
    }

    #[test]
    fn rounds_half_up_to_the_minor_unit() {
        // 9.95 at 50% -> 4.975 -> 4.98
        assert_eq!(discounted_unit_price(9_95, Percent::new(50).unwrap()), 4_98);
        // 9.99 at 10% -> 8.991 -> 8.99
        assert_eq!(discounted_unit_price(9_99, Percent::new(10).unwrap()), 8_99);
        // 1.01 at 33% -> 0.6767 -> 0.68
        assert_eq!(discounted_unit_price(1_01, Percent::new(33).unwrap()), 68);
    }

    proptest! {
        /// Property: a discounted price never exceeds the base price and a
        /// discounting percent never rounds up past it.
        #[test]
        fn discounted_price_is_bounded(base in 0u64..10_000_000_00, pct in 0u8..=100) {
            let percent = Percent::new(pct).unwrap();
            let discounted = discounted_unit_price(base, percent);
            prop_assert!(discounted <= base);
            if pct == 0 {
                prop_assert_eq!(discounted, base);
            }
            if pct == 100 {
                prop_assert_eq!(discounted, 0);
            }
        }

        /// Property: deeper discounts never produce higher prices.
        #[test]
        fn discount_is_monotonic_in_percent(base in 0u64..10_000_000_00, pct in 0u8..100) {
            let lower = discounted_unit_price(base, Percent::new(pct + 1).unwrap());
            let higher = discounted_unit_price(base, Percent::new(pct).unwrap());
            prop_assert!(lower <= higher);
        }
    }
}
