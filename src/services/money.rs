//! Fixed-point money helpers. Every amount leaving the crate has exactly two decimals.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds half away from zero to two places and pins the scale, so `12.5` renders as `12.50`.
pub fn normalize(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    normalize(normalize(unit_price) * Decimal::from(quantity))
}

/// Sum of `unit_price × quantity` over `lines`, rounded once at the end.
pub fn total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    normalize(
        lines
            .into_iter()
            .map(|(price, qty)| normalize(price) * Decimal::from(qty))
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(12.5), "12.50")]
    #[case(dec!(120), "120.00")]
    #[case(dec!(0.005), "0.01")]
    #[case(dec!(19.9949), "19.99")]
    #[case(dec!(50.5000), "50.50")]
    fn normalize_pins_two_decimals(#[case] input: Decimal, #[case] expected: &str) {
        assert_eq!(normalize(input).to_string(), expected);
    }

    #[test]
    fn total_has_no_penny_drift() {
        let lines = vec![(dec!(0.10), 3), (dec!(0.20), 1)];
        assert_eq!(total(lines), dec!(0.50));

        let order = vec![(dec!(120.00), 2), (dec!(50.50), 1)];
        assert_eq!(total(order).to_string(), "290.50");
    }

    #[test]
    fn empty_total_is_zero_with_scale() {
        assert_eq!(total(Vec::new()).to_string(), "0.00");
    }

    #[test]
    fn line_total_multiplies_snapshot() {
        assert_eq!(line_total(dec!(7.25), 4), dec!(29.00));
    }
}
