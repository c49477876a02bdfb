use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amounts are fixed-point decimals with two fractional digits.
pub type Money = Decimal;

pub const CURRENCY_INR: &str = "INR";

/// Round to 2 dp, half away from zero. Every stored amount goes through this.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Gateways take integer minor units.
pub fn paise(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round_dp(0).to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_money(dec!(10.125)), dec!(10.13));
        assert_eq!(round_money(dec!(10.124)), dec!(10.12));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
    }

    #[test]
    fn converts_to_paise() {
        assert_eq!(paise(dec!(548.00)), Some(54800));
        assert_eq!(paise(dec!(0.01)), Some(1));
    }
}
