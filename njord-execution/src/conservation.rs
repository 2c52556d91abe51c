use rust_decimal::Decimal;

/// Default tolerance band for the quantity conservation law (spec §4.H).
pub fn default_tolerance() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

/// `remaining_capacity = max(total_qty - already_filled - in_flight_qty, 0)`.
/// Every replanned slice is capped by this so overshoot is impossible by
/// construction rather than caught after the fact.
pub fn remaining_capacity(total_qty: Decimal, already_filled: Decimal, in_flight_qty: Decimal) -> Decimal {
    (total_qty - already_filled - in_flight_qty).max(Decimal::ZERO)
}

/// At every replan: `total*(1-tol) <= already_filled + remaining_planned <= total*(1+tol)`.
pub fn within_conservation_band(total_qty: Decimal, already_filled: Decimal, remaining_planned: Decimal, tol: Decimal) -> bool {
    let sum = already_filled + remaining_planned;
    let lower = total_qty * (Decimal::ONE - tol);
    let upper = total_qty * (Decimal::ONE + tol);
    sum >= lower && sum <= upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn remaining_capacity_never_negative() {
        assert_eq!(remaining_capacity(dec!(10), dec!(8), dec!(5)), dec!(0));
        assert_eq!(remaining_capacity(dec!(10), dec!(3), dec!(2)), dec!(5));
    }

    #[test]
    fn conservation_band_allows_rounding_slack() {
        let tol = default_tolerance();
        assert!(within_conservation_band(dec!(100), dec!(60), dec!(40), tol));
        assert!(within_conservation_band(dec!(100), dec!(60), dec!(39.95), tol));
        assert!(!within_conservation_band(dec!(100), dec!(60), dec!(30), tol));
    }
}
