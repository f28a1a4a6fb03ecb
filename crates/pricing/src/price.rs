//! Effective unit price computation.

use chrono::{DateTime, Utc};

use emporium_core::discounted_unit_price;

use crate::discount::DiscountState;

/// Combine a product's base price with its discount slot at `now`.
///
/// An active discount with a discounting percent lowers the price (rounded
/// half-up to the minor unit); anything else leaves the base price unchanged.
/// Callers freeze the result into order lines; it is never recomputed for a
/// line once written.
pub fn effective_unit_price(
    base_price_cents: u64,
    discount: Option<&DiscountState>,
    now: DateTime<Utc>,
) -> u64 {
    match discount {
        Some(d) if d.is_active_at(now) => discounted_unit_price(base_price_cents, d.percent),
        _ => base_price_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use emporium_core::Percent;

    fn discount(percent: u8, ends_at: Option<DateTime<Utc>>) -> DiscountState {
        DiscountState {
            percent: Percent::new(percent).unwrap(),
            starts_at: Utc::now() - Duration::hours(1),
            ends_at,
            source: None,
        }
    }

    #[test]
    fn no_discount_returns_base_price() {
        assert_eq!(effective_unit_price(10_00, None, Utc::now()), 10_00);
    }

    #[test]
    fn active_discount_lowers_the_price() {
        let d = discount(20, None);
        assert_eq!(effective_unit_price(10_00, Some(&d), Utc::now()), 8_00);
    }

    #[test]
    fn expired_discount_is_ignored() {
        let d = discount(20, Some(Utc::now() - Duration::minutes(1)));
        assert_eq!(effective_unit_price(10_00, Some(&d), Utc::now()), 10_00);
    }

    #[test]
    fn zero_percent_discount_is_a_pass_through() {
        let d = discount(0, None);
        assert_eq!(effective_unit_price(10_00, Some(&d), Utc::now()), 10_00);
    }

    #[test]
    fn discounted_price_rounds_half_up() {
        // 9.95 at 50% -> 4.975 -> 4.98
        let d = discount(50, None);
        assert_eq!(effective_unit_price(9_95, Some(&d), Utc::now()), 4_98);
    }
}
