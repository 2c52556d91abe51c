use rust_decimal::{Decimal, MathematicalOps};

/// Shared capability for price-impact models (spec §9): `{apply(order_qty,
/// volume, spread, ref_price) -> price_delta}`. Variants {Linear, Sqrt}.
/// Returns an unsigned magnitude; callers apply `+` for buys and `-` for
/// sells (spec §4.H asymmetric sign).
pub trait SlippageModel: Send + Sync {
    fn apply(&self, order_qty: Decimal, market_volume: Decimal, reference_price: Decimal) -> Decimal;
}

/// `slip = impact_coef * (order_size / market_volume) * reference_price`.
#[derive(Debug, Clone, Copy)]
pub struct LinearSlippage {
    pub impact_coef: Decimal,
}

impl SlippageModel for LinearSlippage {
    fn apply(&self, order_qty: Decimal, market_volume: Decimal, reference_price: Decimal) -> Decimal {
        if market_volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.impact_coef * (order_qty / market_volume) * reference_price
    }
}

/// `slip = impact_coef * sqrt(order_size / market_volume) * reference_price`.
#[derive(Debug, Clone, Copy)]
pub struct SqrtSlippage {
    pub impact_coef: Decimal,
}

impl SlippageModel for SqrtSlippage {
    fn apply(&self, order_qty: Decimal, market_volume: Decimal, reference_price: Decimal) -> Decimal {
        if market_volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let ratio = order_qty / market_volume;
        self.impact_coef * ratio.sqrt().unwrap_or(Decimal::ZERO) * reference_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn linear_slippage_monotonic_in_qty() {
        let model = LinearSlippage { impact_coef: dec!(1) };
        let a = model.apply(dec!(10), dec!(1000), dec!(100));
        let b = model.apply(dec!(20), dec!(1000), dec!(100));
        assert!(a <= b);
    }

    #[test]
    fn sqrt_slippage_monotonic_in_qty() {
        let model = SqrtSlippage { impact_coef: dec!(1) };
        let a = model.apply(dec!(10), dec!(1000), dec!(100));
        let b = model.apply(dec!(40), dec!(1000), dec!(100));
        assert!(a <= b);
    }

    #[test]
    fn zero_volume_yields_zero_slippage() {
        let model = LinearSlippage { impact_coef: dec!(1) };
        assert_eq!(model.apply(dec!(10), dec!(0), dec!(100)), Decimal::ZERO);
    }
}
