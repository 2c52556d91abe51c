use njord_core::{FillEvent, PositionSnapshot};
use rust_decimal::Decimal;

/// Running per-`(strategy, symbol)` position state the tracker owns
/// exclusively — other components only ever see it via the
/// [`PositionSnapshot`] the tracker publishes (spec §5, §4.J).
#[derive(Debug, Clone, Default)]
pub struct PositionState {
    pub net_qty: Decimal,
    pub avg_entry: Decimal,
    pub realized_pnl: Decimal,
}

impl PositionState {
    /// Apply a fill using standard weighted-average-entry accounting:
    /// fills that extend the current side widen the average entry; fills
    /// that reduce or flip it realize PnL against the existing entry price
    /// before establishing a new one.
    pub fn apply_fill(&mut self, fill: &FillEvent) {
        let signed_qty = fill.qty * fill.side.sign();
        let same_direction = self.net_qty.is_zero() || self.net_qty.signum() == signed_qty.signum();

        if same_direction {
            let new_qty = self.net_qty + signed_qty;
            if !new_qty.is_zero() {
                self.avg_entry = (self.avg_entry * self.net_qty.abs() + fill.price * signed_qty.abs()) / new_qty.abs();
            }
            self.net_qty = new_qty;
        } else {
            let closing_qty = signed_qty.abs().min(self.net_qty.abs());
            let direction = self.net_qty.signum();
            self.realized_pnl += closing_qty * (fill.price - self.avg_entry) * direction;

            let remainder = signed_qty.abs() - closing_qty;
            self.net_qty += signed_qty;
            if remainder > Decimal::ZERO {
                // Flipped through flat: the excess opens a new position at
                // this fill's price.
                self.avg_entry = fill.price;
            } else if self.net_qty.is_zero() {
                self.avg_entry = Decimal::ZERO;
            }
        }
        self.realized_pnl -= fill.fee;
    }

    pub fn to_snapshot(&self, strategy_id: &str, symbol: &str, ts_ns: i64) -> PositionSnapshot {
        PositionSnapshot {
            strategy_id: strategy_id.to_string(),
            symbol: symbol.to_string(),
            net_qty: self.net_qty,
            avg_entry: self.avg_entry,
            realized_pnl: self.realized_pnl,
            ts_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use njord_core::Side;
    use rust_decimal_macros::dec;

    fn fill(side: Side, qty: Decimal, price: Decimal) -> FillEvent {
        FillEvent {
            client_order_id: "c1".to_string(),
            intent_id: "i1".to_string(),
            symbol: "ATOM/USDT".to_string(),
            side,
            qty,
            price,
            fee: dec!(0),
            ts_ns: 0,
            meta: Default::default(),
        }
    }

    #[test]
    fn opening_and_extending_widens_average_entry() {
        let mut pos = PositionState::default();
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(10)));
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(20)));
        assert_eq!(pos.net_qty, dec!(2));
        assert_eq!(pos.avg_entry, dec!(15));
    }

    #[test]
    fn reducing_position_realizes_pnl_against_entry() {
        let mut pos = PositionState::default();
        pos.apply_fill(&fill(Side::Buy, dec!(2), dec!(10)));
        pos.apply_fill(&fill(Side::Sell, dec!(1), dec!(15)));
        assert_eq!(pos.net_qty, dec!(1));
        assert_eq!(pos.realized_pnl, dec!(5));
        assert_eq!(pos.avg_entry, dec!(10));
    }

    #[test]
    fn flipping_through_flat_opens_new_position_at_fill_price() {
        let mut pos = PositionState::default();
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(10)));
        pos.apply_fill(&fill(Side::Sell, dec!(3), dec!(12)));
        assert_eq!(pos.net_qty, dec!(-2));
        assert_eq!(pos.avg_entry, dec!(12));
        assert_eq!(pos.realized_pnl, dec!(2));
    }

    #[test]
    fn fee_reduces_realized_pnl() {
        let mut pos = PositionState::default();
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(10)));
        let mut sell = fill(Side::Sell, dec!(1), dec!(15));
        sell.fee = dec!(0.5);
        pos.apply_fill(&sell);
        assert_eq!(pos.realized_pnl, dec!(4.5));
    }
}
