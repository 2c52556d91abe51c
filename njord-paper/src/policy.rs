use njord_core::{OhlcvBar, OrderEvent, OrderType, Side};
use rust_decimal::Decimal;

/// Result of attempting to fill a limit order against a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillOutcome {
    pub qty: Decimal,
    pub price: Decimal,
}

/// Extension point for the Open Question on limit-order partial fills
/// (spec §9): the baseline ships all-or-nothing per bar; a future partial
/// fill model can implement this trait without touching the executor or
/// [`crate::PaperTrader`].
pub trait FillPolicy: Send + Sync {
    fn try_fill_limit(&self, order: &OrderEvent, bar: &OhlcvBar) -> Option<FillOutcome>;
}

/// Baseline limit-fill policy (spec §4.F): limit buy fills iff `bar.low <=
/// limit`; limit sell fills iff `bar.high >= limit`; fill price is the
/// limit price. Partial fills are not modelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOrNothing;

impl FillPolicy for AllOrNothing {
    fn try_fill_limit(&self, order: &OrderEvent, bar: &OhlcvBar) -> Option<FillOutcome> {
        debug_assert_eq!(order.kind, OrderType::Limit);
        let limit = order.limit_price?;
        let filled = match order.side {
            Side::Buy => bar.low <= limit,
            Side::Sell => bar.high >= limit,
        };
        filled.then_some(FillOutcome { qty: order.qty, price: limit })
    }
}
