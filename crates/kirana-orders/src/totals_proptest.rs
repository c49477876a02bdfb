//! Property tests for the money arithmetic the cart invariants rest on.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use kirana_core::money::round_money;

    use crate::services::revalidation::compute_line_total;

    fn money_strategy() -> impl Strategy<Value = Decimal> {
        // Paise-denominated amounts up to ₹1,00,000.
        (0i64..=10_000_000).prop_map(|paise| Decimal::new(paise, 2))
    }

    proptest! {
        #[test]
        fn line_total_is_never_negative(
            quantity in 1i32..=50,
            unit_price in money_strategy(),
            line_discount in money_strategy(),
        ) {
            let total = compute_line_total(quantity, unit_price, line_discount);
            prop_assert!(total >= Decimal::ZERO);
        }

        #[test]
        fn line_total_without_discount_is_exact(
            quantity in 1i32..=50,
            unit_price in money_strategy(),
        ) {
            let total = compute_line_total(quantity, unit_price, Decimal::ZERO);
            prop_assert_eq!(total, round_money(unit_price * Decimal::from(quantity)));
        }

        #[test]
        fn grand_total_formula_clamps_at_zero(
            subtotal in money_strategy(),
            discount in money_strategy(),
            shipping in money_strategy(),
            tax in money_strategy(),
        ) {
            let grand = round_money((subtotal - discount + shipping + tax).max(Decimal::ZERO));
            prop_assert!(grand >= Decimal::ZERO);
            if discount <= subtotal {
                prop_assert_eq!(grand, subtotal - discount + shipping + tax);
            }
        }

        #[test]
        fn rounding_is_stable(amount in money_strategy()) {
            // Already-rounded values pass through unchanged.
            prop_assert_eq!(round_money(amount), amount);
        }
    }
}
