use crate::{
    context::Context,
    error::StrategyError,
    strategy::{Strategy, StrategyDescriptor},
};
use futures::{Stream, StreamExt};
use njord_bus::Bus;
use njord_risk::{PositionView, ReferencePriceCache};
use std::{collections::BTreeSet, panic::AssertUnwindSafe, pin::Pin, sync::Arc};
use tokio::sync::watch;
use tracing::warn;

struct HostEntry {
    descriptor: StrategyDescriptor,
    strategy: Box<dyn Strategy>,
}

/// Dispatches bus events to every registered strategy whose topic pattern
/// matches, in registration order, isolating panics/failures per strategy
/// so one misbehaving strategy never blocks the others (spec §4.I).
pub struct StrategyHost {
    bus: Bus,
    positions: Arc<dyn PositionView>,
    prices: Arc<ReferencePriceCache>,
    entries: Vec<HostEntry>,
}

impl StrategyHost {
    pub fn new(bus: Bus, positions: Arc<dyn PositionView>, prices: Arc<ReferencePriceCache>) -> Self {
        Self {
            bus,
            positions,
            prices,
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, descriptor: StrategyDescriptor, mut strategy: Box<dyn Strategy>) {
        strategy.on_start(&descriptor.params);
        self.entries.push(HostEntry { descriptor, strategy });
    }

    /// Deliver one event to every strategy subscribed to `pattern`,
    /// publishing any intents they return to `strat.intent`.
    pub async fn dispatch(&mut self, pattern: &str, payload: &serde_json::Value) -> Result<(), StrategyError> {
        let mut to_publish = Vec::new();
        for entry in self.entries.iter_mut() {
            if !entry.descriptor.topics.iter().any(|p| p == pattern) {
                continue;
            }
            let ctx = Context {
                bus: &self.bus,
                positions: self.positions.clone(),
                prices: self.prices.clone(),
                params: &entry.descriptor.params,
                strategy_id: entry.descriptor.strategy_id.clone(),
            };
            let strategy = &mut entry.strategy;
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| strategy.on_event(&ctx, pattern, payload)));
            match result {
                Ok(intents) => to_publish.extend(intents),
                Err(_) => {
                    warn!(strategy_id = %entry.descriptor.strategy_id, "strategy panicked, isolated from the rest of the host");
                }
            }
        }
        for intent in &to_publish {
            self.bus
                .publish("strat.intent", intent)
                .await
                .map_err(|e| StrategyError::Bus(e.to_string()))?;
        }
        Ok(())
    }

    fn subscribed_patterns(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| e.descriptor.topics.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Run the host until `shutdown` is signalled, merging every distinct
    /// topic pattern across registered descriptors into one dispatch loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), StrategyError> {
        let patterns = self.subscribed_patterns();
        let mut streams: Vec<Pin<Box<dyn Stream<Item = (String, Result<serde_json::Value, njord_bus::BusError>)> + Send>>> =
            Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let sub = self.bus.subscribe::<serde_json::Value>(pattern.clone());
            streams.push(Box::pin(sub.map(move |r| (pattern.clone(), r))));
        }
        let mut merged = futures::stream::select_all(streams);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                item = merged.next() => {
                    match item {
                        Some((pattern, Ok(payload))) => {
                            self.dispatch(&pattern, &payload).await?;
                        }
                        Some((pattern, Err(err))) => {
                            warn!(%pattern, %err, "strategy host: event deserialize error");
                        }
                        None => break,
                    }
                }
            }
        }
        for entry in self.entries.iter_mut() {
            entry.strategy.on_stop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use njord_core::{OrderIntent, OrderType, Side};
    use njord_risk::InMemoryPositionView;
    use serde_json::json;

    struct EchoStrategy;
    impl Strategy for EchoStrategy {
        fn on_event(&mut self, ctx: &Context, _topic: &str, payload: &serde_json::Value) -> Vec<OrderIntent> {
            let qty = payload.get("qty").and_then(|v| v.as_str()).unwrap_or("1");
            vec![OrderIntent {
                intent_id: "i1".to_string(),
                ts_ns: 0,
                strategy_id: ctx.strategy_id.clone(),
                symbol: "ATOM/USDT".to_string(),
                side: Side::Buy,
                kind: OrderType::Market,
                qty: qty.parse().unwrap(),
                limit_price: None,
                meta: Default::default(),
            }]
        }
    }

    struct PanickingStrategy;
    impl Strategy for PanickingStrategy {
        fn on_event(&mut self, _ctx: &Context, _topic: &str, _payload: &serde_json::Value) -> Vec<OrderIntent> {
            panic!("boom");
        }
    }

    fn host(bus: Bus) -> StrategyHost {
        StrategyHost::new(
            bus,
            Arc::new(InMemoryPositionView::new()),
            Arc::new(ReferencePriceCache::new()),
        )
    }

    #[tokio::test]
    async fn matching_strategy_publishes_intent() {
        let bus = Bus::new();
        let mut sub = bus.subscribe::<OrderIntent>("strat.intent");
        let mut host = host(bus);
        host.register(
            StrategyDescriptor {
                strategy_id: "s1".to_string(),
                topics: vec!["md.trades.*".to_string()],
                symbols: vec!["ATOM/USDT".to_string()],
                params: Default::default(),
            },
            Box::new(EchoStrategy),
        );
        host.dispatch("md.trades.*", &json!({"qty": "2"})).await.unwrap();
        use futures::StreamExt;
        let intent = sub.next().await.unwrap().unwrap();
        assert_eq!(intent.qty, rust_decimal_macros::dec!(2));
    }

    #[tokio::test]
    async fn panicking_strategy_is_isolated_others_still_run() {
        let bus = Bus::new();
        let mut sub = bus.subscribe::<OrderIntent>("strat.intent");
        let mut host = host(bus);
        host.register(
            StrategyDescriptor {
                strategy_id: "bad".to_string(),
                topics: vec!["md.trades.*".to_string()],
                symbols: vec![],
                params: Default::default(),
            },
            Box::new(PanickingStrategy),
        );
        host.register(
            StrategyDescriptor {
                strategy_id: "good".to_string(),
                topics: vec!["md.trades.*".to_string()],
                symbols: vec![],
                params: Default::default(),
            },
            Box::new(EchoStrategy),
        );
        host.dispatch("md.trades.*", &json!({"qty": "1"})).await.unwrap();
        use futures::StreamExt;
        let intent = sub.next().await.unwrap().unwrap();
        assert_eq!(intent.strategy_id, "good");
    }
}
