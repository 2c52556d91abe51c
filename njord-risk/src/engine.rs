use crate::{position_view::PositionView, rate_limiter::RateLimiter, reference_price::ReferencePriceCache};
use njord_bus::Bus;
use njord_core::{client_order_id, OrderEvent, OrderIntent, OrderType, RiskDecision};
use njord_killswitch::{KillSwitch, SharedState};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// Object-safe projection of [`KillSwitch::tripped`] so the Risk Engine
/// doesn't need to be generic over the shared-state backend.
pub trait Halts: Send + Sync {
    fn tripped(&self) -> bool;
}

impl<S: SharedState + 'static> Halts for KillSwitch<S> {
    fn tripped(&self) -> bool {
        KillSwitch::tripped(self)
    }
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub venue: String,
    pub symbol_allow_list: Vec<String>,
    pub rate_cap_per_strategy: usize,
    pub rate_window_ns: i64,
    pub position_cap_usd: Decimal,
    pub live_micro_cap_usd: Decimal,
    /// `app.env == live` AND `NJORD_ENABLE_LIVE=1` (spec §6).
    pub live_enabled: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            venue: "default".to_string(),
            symbol_allow_list: Vec::new(),
            rate_cap_per_strategy: 100,
            rate_window_ns: 1_000_000_000,
            position_cap_usd: Decimal::new(1_000_000, 0),
            live_micro_cap_usd: Decimal::TEN,
            live_enabled: false,
        }
    }
}

pub struct RiskOutcome {
    pub decision: RiskDecision,
    pub order: Option<OrderEvent>,
}

/// Gate that transforms strategy intents into authorized orders (spec §4.E).
pub struct RiskEngine {
    config: RiskConfig,
    kill_switch: Arc<dyn Halts>,
    rate_limiter: RateLimiter,
    reference_prices: Arc<ReferencePriceCache>,
    positions: Arc<dyn PositionView>,
}

impl RiskEngine {
    pub fn new(
        config: RiskConfig,
        kill_switch: Arc<dyn Halts>,
        reference_prices: Arc<ReferencePriceCache>,
        positions: Arc<dyn PositionView>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_cap_per_strategy, config.rate_window_ns);
        Self {
            config,
            kill_switch,
            rate_limiter,
            reference_prices,
            positions,
        }
    }

    /// Evaluate `intent`, short-circuiting on the first applicable denial
    /// (spec §4.E order: kill-switch, allow-list, rate cap, position cap,
    /// live micro-cap, sanity).
    pub fn evaluate(&self, intent: &OrderIntent, now_ns: i64) -> RiskOutcome {
        if let Some(reason) = self.first_denial(intent, now_ns) {
            debug!(intent_id = %intent.intent_id, reason, "risk decision: denied");
            return RiskOutcome {
                decision: RiskDecision {
                    intent_id: intent.intent_id.clone(),
                    allowed: false,
                    reason: Some(reason.to_string()),
                    ts_ns: now_ns,
                },
                order: None,
            };
        }

        let order = OrderEvent {
            intent_id: intent.intent_id.clone(),
            client_order_id: client_order_id(&intent.intent_id),
            venue: self.config.venue.clone(),
            symbol: intent.symbol.clone(),
            side: intent.side,
            kind: intent.kind,
            qty: intent.qty,
            limit_price: intent.limit_price,
            ts_ns: now_ns,
        };
        RiskOutcome {
            decision: RiskDecision {
                intent_id: intent.intent_id.clone(),
                allowed: true,
                reason: None,
                ts_ns: now_ns,
            },
            order: Some(order),
        }
    }

    /// Evaluate `intent` and publish the resulting [`RiskDecision`] to
    /// `risk.decisions`, and the [`OrderEvent`] to `orders.accepted` iff
    /// allowed — RiskDecision is published before (or atomically with) the
    /// OrderEvent, per the ordering guarantee in spec §5.
    pub async fn evaluate_and_publish(&self, bus: &Bus, intent: &OrderIntent, now_ns: i64) -> RiskOutcome {
        let outcome = self.evaluate(intent, now_ns);
        if let Err(err) = bus.publish("risk.decisions", &outcome.decision).await {
            warn!(%err, "failed to publish risk decision");
        }
        if let Some(order) = &outcome.order {
            if let Err(err) = bus.publish("orders.accepted", order).await {
                warn!(%err, "failed to publish order event");
            }
        }
        outcome
    }

    fn first_denial(&self, intent: &OrderIntent, now_ns: i64) -> Option<&'static str> {
        if self.kill_switch.tripped() {
            return Some("halted");
        }

        if !self.config.symbol_allow_list.is_empty()
            && !self.config.symbol_allow_list.iter().any(|s| s == &intent.symbol)
        {
            return Some("symbol_not_allowed");
        }

        if !self.rate_limiter.check_and_record(&intent.strategy_id, now_ns) {
            return Some("rate_cap");
        }

        let Some(reference_price) = self.reference_prices.get(&intent.symbol, now_ns) else {
            return Some("stale_reference");
        };

        let projected_net = self.positions.net_qty(&intent.strategy_id, &intent.symbol) + intent.qty * intent.side.sign();
        let projected_notional = projected_net.abs() * reference_price;
        if projected_notional > self.config.position_cap_usd {
            return Some("position_cap");
        }

        if self.config.live_enabled {
            let notional = intent.qty * reference_price;
            if notional > self.config.live_micro_cap_usd {
                warn!(intent_id = %intent.intent_id, %notional, "live micro-cap breached");
                return Some("live_micro_cap");
            }
        }

        if intent.qty <= Decimal::ZERO {
            return Some("malformed");
        }
        if intent.kind == OrderType::Limit && intent.limit_price.is_none() {
            return Some("malformed");
        }

        None
    }
}
