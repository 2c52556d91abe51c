//! Glue loops connecting the primitive operations each component crate
//! exposes into the running pipeline spec.md §2 describes: strategy intent
//! -> risk decision -> order -> broker ack -> fill -> portfolio update.
//! Each loop here is intentionally thin — the decision logic lives in its
//! owning crate; this module only wires bus topics to method calls.

use futures::StreamExt;
use njord_broker::{BrokerAdapter, Halts, VenueClient};
use njord_bus::Bus;
use njord_core::{BrokerOrderUpdate, FillEvent, OrderEvent, OrderIntent};
use njord_risk::RiskEngine;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;
use tracing::warn;

/// Evaluate every intent on `strat.intent` through `risk` and publish the
/// resulting decision/order pair. Runs until `shutdown` fires or the bus
/// closes.
pub async fn run_risk_loop(bus: Bus, risk: Arc<RiskEngine>, clock: Arc<dyn njord_core::Clock>, mut shutdown: watch::Receiver<bool>) {
    let mut intents = bus.subscribe::<OrderIntent>("strat.intent");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = intents.next() => {
                match next {
                    Some(Ok(intent)) => {
                        let now_ns = clock.now_ns();
                        risk.evaluate_and_publish(&bus, &intent, now_ns).await;
                    }
                    Some(Err(err)) => warn!(%err, "risk loop: malformed intent"),
                    None => break,
                }
            }
        }
    }
}

#[derive(Clone)]
struct OpenOrder {
    intent_id: String,
    client_order_id: String,
    symbol: String,
    side: njord_core::Side,
    last_seen_filled_qty: Decimal,
}

/// Tracks the venue-assigned `exchange_order_id` for every order placed
/// this process lifetime, so a later [`BrokerOrderUpdate`] can be turned
/// back into a [`FillEvent`] (spec §4.G/§4.H: the broker publishes order
/// state, not fills directly; wiring bridges the two).
#[derive(Clone, Default)]
pub struct OrderIndex {
    by_exchange_id: Arc<Mutex<HashMap<String, OpenOrder>>>,
}

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Consume `orders.accepted`, place each order through `adapter`, publish
/// the resulting ack to `broker.acks`, and remember the exchange-order-id
/// mapping in `index` for the fill bridge.
pub async fn run_broker_order_loop<C, K>(
    bus: Bus,
    adapter: Arc<BrokerAdapter<C, K>>,
    index: OrderIndex,
    mut shutdown: watch::Receiver<bool>,
) where
    C: VenueClient,
    K: Halts,
{
    let mut orders = bus.subscribe::<OrderEvent>("orders.accepted");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = orders.next() => {
                match next {
                    Some(Ok(order)) => {
                        match adapter.place(&order).await {
                            Ok(ack) => {
                                index.by_exchange_id.lock().insert(
                                    ack.exchange_order_id.clone(),
                                    OpenOrder {
                                        intent_id: order.intent_id.clone(),
                                        client_order_id: order.client_order_id.clone(),
                                        symbol: order.symbol.clone(),
                                        side: order.side,
                                        last_seen_filled_qty: Decimal::ZERO,
                                    },
                                );
                                if let Err(err) = bus.publish("broker.acks", &ack).await {
                                    warn!(%err, "failed to publish broker ack");
                                }
                            }
                            Err(err) => warn!(%err, client_order_id = %order.client_order_id, "order placement failed"),
                        }
                    }
                    Some(Err(err)) => warn!(%err, "broker order loop: malformed order event"),
                    None => break,
                }
            }
        }
    }
}

/// Consume `broker.orders` (the [`BrokerOrderUpdate`] stream `reconcile_user_stream`
/// publishes) and translate each incremental fill into a [`FillEvent`] on
/// `fills.new`. Only the delta since the last observed `filled_qty` is
/// published per update, so a partially-filled order emits one `FillEvent`
/// per increment rather than re-publishing its cumulative total.
pub async fn run_broker_fill_bridge(bus: Bus, index: OrderIndex, clock: Arc<dyn njord_core::Clock>, mut shutdown: watch::Receiver<bool>) {
    let mut updates = bus.subscribe::<BrokerOrderUpdate>("broker.orders");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = updates.next() => {
                match next {
                    Some(Ok(update)) => {
                        let delta = {
                            let mut guard = index.by_exchange_id.lock();
                            let Some(open) = guard.get_mut(&update.exchange_order_id) else {
                                continue;
                            };
                            let delta = update.filled_qty - open.last_seen_filled_qty;
                            if delta <= Decimal::ZERO {
                                continue;
                            }
                            open.last_seen_filled_qty = update.filled_qty;
                            Some((delta, open.clone()))
                        };
                        let Some((delta_qty, open)) = delta else { continue };
                        let fill = FillEvent {
                            client_order_id: open.client_order_id,
                            intent_id: open.intent_id,
                            symbol: open.symbol,
                            side: open.side,
                            qty: delta_qty,
                            price: update.avg_price,
                            fee: Decimal::ZERO,
                            ts_ns: clock.now_ns(),
                            meta: Default::default(),
                        };
                        if let Err(err) = bus.publish("fills.new", &fill).await {
                            warn!(%err, "failed to publish bridged fill event");
                        }
                    }
                    Some(Err(err)) => warn!(%err, "fill bridge: malformed order update"),
                    None => break,
                }
            }
        }
    }
}
