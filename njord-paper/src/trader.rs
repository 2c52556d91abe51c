use crate::{policy::FillPolicy, slippage::SlippageModel};
use futures::StreamExt;
use njord_bus::Bus;
use njord_core::{FillEvent, IntentMetaStore, OhlcvBar, OrderEvent, OrderType, Side};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{trace, warn};

/// Last-trade + recent-volume oracle the live paper-trading loop reads from
/// (fed by the market-data ingest path).
pub trait PriceOracle: Send + Sync {
    fn last_trade(&self, symbol: &str) -> Option<(Decimal, Decimal)>;
}

/// Deterministic fill simulator (spec §4.F). Same instance drives both
/// backtest replay (bar-close fills) and live paper-trading (last-trade
/// fills) — only the price oracle call site differs.
pub struct PaperTrader<S, P> {
    slippage: S,
    fill_policy: P,
    commission_rate: Decimal,
    meta_store: Arc<IntentMetaStore>,
}

impl<S: SlippageModel, P: FillPolicy> PaperTrader<S, P> {
    pub fn new(slippage: S, fill_policy: P, commission_rate: Decimal, meta_store: Arc<IntentMetaStore>) -> Self {
        Self {
            slippage,
            fill_policy,
            commission_rate,
            meta_store,
        }
    }

    fn commission(&self, qty: Decimal, price: Decimal) -> Decimal {
        qty * price * self.commission_rate
    }

    fn build_fill(&self, order: &OrderEvent, qty: Decimal, price: Decimal) -> FillEvent {
        FillEvent {
            client_order_id: order.client_order_id.clone(),
            intent_id: order.intent_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty,
            price,
            fee: self.commission(qty, price),
            ts_ns: order.ts_ns,
            meta: self.meta_store.get(&order.intent_id),
        }
    }

    /// Backtest path: market orders fill at the bar mid plus slippage at
    /// the bar close; limit orders follow [`FillPolicy`]. Returns `None`
    /// when a limit order does not trade against this bar.
    pub fn fill_against_bar(&self, order: &OrderEvent, bar: &OhlcvBar) -> Option<FillEvent> {
        match order.kind {
            OrderType::Market => {
                let mid = (bar.high + bar.low) / Decimal::TWO;
                let slip = self.slippage.apply(order.qty, bar.volume, mid);
                let signed = match order.side {
                    Side::Buy => slip,
                    Side::Sell => -slip,
                };
                Some(self.build_fill(order, order.qty, mid + signed))
            }
            OrderType::Limit => {
                let outcome = self.fill_policy.try_fill_limit(order, bar)?;
                Some(self.build_fill(order, outcome.qty, outcome.price))
            }
        }
    }

    /// Live paper-trading path: market orders fill immediately at the last
    /// trade price plus slippage against the observed `recent_volume`.
    pub fn fill_market_live(&self, order: &OrderEvent, last_trade_price: Decimal, recent_volume: Decimal) -> FillEvent {
        debug_assert_eq!(order.kind, OrderType::Market);
        let slip = self.slippage.apply(order.qty, recent_volume, last_trade_price);
        let signed = match order.side {
            Side::Buy => slip,
            Side::Sell => -slip,
        };
        trace!(client_order_id = %order.client_order_id, "paper-filled market order live");
        self.build_fill(order, order.qty, last_trade_price + signed)
    }

    /// Live paper-trading loop: consume `orders.accepted`, fill market
    /// orders immediately against `oracle`, and publish `fills.new`. Limit
    /// orders are left to the backtest/bar-driven path since they require a
    /// bar stream to evaluate against.
    pub async fn run_live(&self, bus: &Bus, oracle: &dyn PriceOracle)
    where
        S: Sync,
        P: Sync,
    {
        let mut orders = bus.subscribe::<OrderEvent>("orders.accepted");
        while let Some(next) = orders.next().await {
            let order = match next {
                Ok(order) => order,
                Err(err) => {
                    warn!(%err, "malformed order event on orders.accepted");
                    continue;
                }
            };
            if order.kind != OrderType::Market {
                continue;
            }
            let Some((price, volume)) = oracle.last_trade(&order.symbol) else {
                warn!(symbol = %order.symbol, "no reference price available for live paper fill");
                continue;
            };
            let fill = self.fill_market_live(&order, price, volume);
            if let Err(err) = bus.publish("fills.new", &fill).await {
                warn!(%err, "failed to publish fill event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{policy::AllOrNothing, slippage::LinearSlippage};
    use njord_core::Timeframe;
    use rust_decimal_macros::dec;

    fn trader() -> PaperTrader<LinearSlippage, AllOrNothing> {
        PaperTrader::new(
            LinearSlippage { impact_coef: dec!(0) },
            AllOrNothing,
            dec!(0.001),
            Arc::new(IntentMetaStore::new()),
        )
    }

    fn market_order(side: Side, qty: Decimal) -> OrderEvent {
        OrderEvent {
            intent_id: "i1".into(),
            client_order_id: "c1".into(),
            venue: "paper".into(),
            symbol: "ATOM/USDT".into(),
            side,
            kind: OrderType::Market,
            qty,
            limit_price: None,
            ts_ns: 0,
        }
    }

    fn bar() -> OhlcvBar {
        OhlcvBar {
            symbol: "ATOM/USDT".into(),
            timeframe: Timeframe::M1,
            ts_open_ns: 0,
            ts_close_ns: Timeframe::M1.duration_ns(),
            open: dec!(10),
            high: dec!(11),
            low: dec!(9),
            close: dec!(10.5),
            volume: dec!(1000),
        }
    }

    #[test]
    fn market_order_fills_at_bar_mid_with_commission() {
        let trader = trader();
        let fill = trader.fill_against_bar(&market_order(Side::Buy, dec!(2)), &bar()).unwrap();
        assert_eq!(fill.price, dec!(10)); // mid of 9/11
        assert_eq!(fill.fee, dec!(2) * dec!(10) * dec!(0.001));
    }

    #[test]
    fn fill_carries_forward_intent_meta() {
        let meta_store = Arc::new(IntentMetaStore::new());
        let mut meta = njord_core::Meta::new();
        meta.insert("execution_id".into(), serde_json::json!("exec-1"));
        meta_store.record("i1", meta);

        let trader = PaperTrader::new(
            LinearSlippage { impact_coef: dec!(0) },
            AllOrNothing,
            dec!(0),
            meta_store,
        );
        let fill = trader.fill_against_bar(&market_order(Side::Buy, dec!(1)), &bar()).unwrap();
        assert_eq!(fill.meta.get("execution_id").unwrap(), "exec-1");
    }

    #[test]
    fn deterministic_same_inputs_same_fill() {
        let trader = trader();
        let order = market_order(Side::Sell, dec!(3));
        let f1 = trader.fill_against_bar(&order, &bar()).unwrap();
        let f2 = trader.fill_against_bar(&order, &bar()).unwrap();
        assert_eq!(f1, f2);
    }
}
