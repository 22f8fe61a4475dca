//! Money arithmetic for derived balances.
//!
//! Amounts are stored as `REAL` but every derived value is computed in [`Decimal`], rounded
//! to cents at each aggregation step. Sums of cents are exact, so no drift accumulates no
//! matter how many rows are added.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for monetary values.
pub const CENT_PLACES: u32 = 2;

/// Tolerance used wherever a sum is compared against zero to decide settlement.
///
/// Cent arithmetic is exact, so this only guards against values that entered the store with
/// more precision than cents.
pub const SETTLEMENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Rounds a value to cents, halves away from zero.
#[must_use]
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CENT_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether an amount can be written: finite and within the range of [`Decimal`].
#[must_use]
pub fn is_valid_amount(value: f64) -> bool {
    Decimal::from_f64(value).is_some()
}

/// Converts a stored amount to a cent-rounded decimal.
///
/// Amounts failing [`is_valid_amount`] are rejected at write time; should one reach this
/// point it counts as zero.
#[must_use]
pub fn to_money(value: f64) -> Decimal {
    round_cents(Decimal::from_f64(value).unwrap_or_default())
}

/// Sums amounts, rounding to cents after every addition.
pub fn sum_money<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .fold(Decimal::ZERO, |total, value| round_cents(total + value))
}

/// Whether a value is zero within [`SETTLEMENT_TOLERANCE`].
#[must_use]
pub fn is_settled(value: Decimal) -> bool {
    value.abs() <= SETTLEMENT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_money_rounds_to_cents() {
        assert_eq!(to_money(12.346), dec!(12.35));
        assert_eq!(to_money(-12.344), dec!(-12.34));
        assert_eq!(round_cents(dec!(0.125)), dec!(0.13));
        assert_eq!(round_cents(dec!(-0.125)), dec!(-0.13));
        assert_eq!(to_money(0.1 + 0.2), dec!(0.30));
        assert_eq!(to_money(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_valid_amounts() {
        assert!(is_valid_amount(-12.5));
        assert!(is_valid_amount(0.0));
        assert!(is_valid_amount(1e20));
        assert!(!is_valid_amount(1e29));
        assert!(!is_valid_amount(-1e29));
        assert!(!is_valid_amount(f64::INFINITY));
        assert!(!is_valid_amount(f64::NAN));
    }

    #[test]
    fn test_thousand_cents_make_ten_dollars() {
        let total = sum_money(std::iter::repeat_n(to_money(0.01), 1000));
        assert_eq!(total, dec!(10.00));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        assert_eq!(sum_money(std::iter::empty()), Decimal::ZERO);
    }

    #[test]
    fn test_settlement_tolerance() {
        assert!(is_settled(Decimal::ZERO));
        assert!(is_settled(dec!(0.0000005)));
        assert!(!is_settled(dec!(0.01)));
        assert!(!is_settled(dec!(-0.01)));
    }

    proptest! {
        #[test]
        fn prop_sum_matches_integer_cents(cents in proptest::collection::vec(-100_000i64..100_000, 0..200)) {
            let expected = Decimal::new(cents.iter().sum::<i64>(), 2);
            #[allow(clippy::cast_precision_loss)]
            let total = sum_money(cents.iter().map(|c| to_money(*c as f64 / 100.0)));
            prop_assert_eq!(total, expected);
        }
    }
}
