use crate::{
    client::{PlaceOrderRequest, VenueClient, VenueError},
    error::BrokerError,
};
use njord_bus::Bus;
use njord_core::{BrokerOrderAck, Clock, OrderEvent};
use njord_journal::Journal;
use njord_killswitch::{KillSwitch, SharedState};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Object-safe projection of [`KillSwitch::tripped`], mirrored from
/// `njord-risk` so the Broker Adapter doesn't need a dependency on it.
pub trait Halts: Send + Sync {
    fn tripped(&self) -> bool;
}

impl<S: SharedState + 'static> Halts for KillSwitch<S> {
    fn tripped(&self) -> bool {
        KillSwitch::tripped(self)
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// `app.env == live` AND `NJORD_ENABLE_LIVE=1` (spec §4.G, §6).
    pub live_enabled: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            max_delay_ms: 10_000,
            max_attempts: 5,
            live_enabled: false,
        }
    }
}

/// Venue-facing adapter (spec §4.G). Two safety gates sit in front of any
/// live placement: the kill-switch, and `live_enabled`. When not live, the
/// adapter dry-runs: it echoes the order to `broker.echo` and journals it
/// without ever calling the venue.
pub struct BrokerAdapter<C, K> {
    client: C,
    kill_switch: Arc<K>,
    config: BrokerConfig,
    bus: Bus,
    echo_journal: Journal,
    clock: Arc<dyn Clock>,
}

impl<C: VenueClient, K: Halts> BrokerAdapter<C, K> {
    pub fn new(
        client: C,
        kill_switch: Arc<K>,
        config: BrokerConfig,
        bus: Bus,
        echo_journal: Journal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            kill_switch,
            config,
            bus,
            echo_journal,
            clock,
        }
    }

    pub async fn place(&self, order: &OrderEvent) -> Result<BrokerOrderAck, BrokerError> {
        if self.kill_switch.tripped() {
            return Err(BrokerError::Halted);
        }

        if !self.config.live_enabled {
            self.bus
                .publish("broker.echo", order)
                .await
                .map_err(|e| BrokerError::Bus(e.to_string()))?;
            self.echo_journal
                .append(order)
                .await
                .map_err(|e| BrokerError::Journal(e.to_string()))?;
            info!(client_order_id = %order.client_order_id, "dry-run: order echoed, not sent to venue");
            return Ok(BrokerOrderAck {
                client_order_id: order.client_order_id.clone(),
                exchange_order_id: format!("dry-{}", order.client_order_id),
                ts_ns: order.ts_ns,
            });
        }

        self.place_live(&PlaceOrderRequest::from(order)).await
    }

    async fn place_live(&self, req: &PlaceOrderRequest) -> Result<BrokerOrderAck, BrokerError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.create_order(req).await {
                Ok(ack) => return Ok(ack),
                Err(VenueError::DuplicateClientId(_)) => {
                    // Idempotent replay: fetch the existing order instead of
                    // retrying the placement (spec §4.G, §7 Safety taxonomy).
                    return self
                        .client
                        .fetch_order(&req.client_order_id)
                        .await
                        .map_err(BrokerError::from);
                }
                Err(VenueError::Permanent(msg)) => return Err(BrokerError::Rejected(msg)),
                Err(err @ (VenueError::NetworkTransient(_) | VenueError::RateLimited { .. })) => {
                    if attempt >= self.config.max_attempts {
                        warn!(attempt, "broker retries exhausted");
                        return Err(BrokerError::RetriesExhausted(err));
                    }
                    let backoff_ms = self.config.base_delay_ms.saturating_mul(1u64 << (attempt - 1));
                    let backoff_ms = backoff_ms.min(self.config.max_delay_ms);
                    let retry_after_ms = match &err {
                        VenueError::RateLimited { retry_after: Some(d) } => Some(d.as_millis() as u64),
                        _ => None,
                    };
                    let delay_ms = retry_after_ms.map_or(backoff_ms, |ra| ra.max(backoff_ms));
                    warn!(attempt, delay_ms, "retrying order placement after transient venue error");
                    self.clock.sleep((delay_ms as i64) * 1_000_000).await;
                }
            }
        }
    }

    pub async fn cancel(&self, exchange_order_id: &str) -> Result<bool, BrokerError> {
        if self.kill_switch.tripped() {
            return Err(BrokerError::Halted);
        }
        Ok(self.client.cancel_order(exchange_order_id).await?)
    }

    pub async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<njord_core::BrokerOrderUpdate>, BrokerError> {
        Ok(self.client.fetch_open_orders(symbol).await?)
    }

    pub async fn fetch_balances(&self) -> Result<std::collections::HashMap<String, rust_decimal::Decimal>, BrokerError> {
        Ok(self.client.fetch_balances().await?)
    }

    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1))
            .min(self.config.max_delay_ms)
    }
}

/// Helper retained for documentation/tests: exponential backoff formula
/// `base * 2^(attempt-1)` capped at `max_delay`.
pub fn exponential_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    let scaled = base.saturating_mul(1u32 << attempt.saturating_sub(1));
    scaled.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockVenueClient;
    use njord_core::{client_order_id, FixedClock, OrderType, Side, SystemClock};
    use njord_killswitch::InMemorySharedState;

    fn order() -> OrderEvent {
        OrderEvent {
            intent_id: "i1".into(),
            client_order_id: client_order_id("i1"),
            venue: "mock".into(),
            symbol: "ATOM/USDT".into(),
            side: Side::Buy,
            kind: OrderType::Market,
            qty: rust_decimal_macros::dec!(1.0),
            limit_price: None,
            ts_ns: 0,
        }
    }

    fn adapter(
        client: MockVenueClient,
        live: bool,
        dir: &std::path::Path,
    ) -> BrokerAdapter<MockVenueClient, KillSwitch<InMemorySharedState>> {
        adapter_with_clock(client, live, dir, Arc::new(FixedClock::new(0)))
    }

    fn adapter_with_clock(
        client: MockVenueClient,
        live: bool,
        dir: &std::path::Path,
        clock: Arc<dyn Clock>,
    ) -> BrokerAdapter<MockVenueClient, KillSwitch<InMemorySharedState>> {
        let ks = Arc::new(KillSwitch::new(
            dir.join("nonexistent-sentinel"),
            "halt",
            Arc::new(InMemorySharedState::default()),
        ));
        let bus = Bus::new();
        let journal = Journal::new(dir, "broker.echo", None);
        let mut config = BrokerConfig::default();
        config.live_enabled = live;
        BrokerAdapter::new(client, ks, config, bus, journal, clock)
    }

    #[tokio::test]
    async fn s1_dry_run_echoes_without_calling_venue() {
        let dir = tempfile::tempdir().unwrap();
        let a = adapter(MockVenueClient::new(), false, dir.path());
        let ack = a.place(&order()).await.unwrap();
        assert_eq!(ack.client_order_id, order().client_order_id);
        assert!(ack.exchange_order_id.starts_with("dry-"));
    }

    #[tokio::test]
    async fn s3_duplicate_placement_returns_same_ack_without_duplicate_on_venue() {
        let dir = tempfile::tempdir().unwrap();
        let a = adapter(MockVenueClient::new(), true, dir.path());
        let first = a.place_live(&PlaceOrderRequest::from(&order())).await.unwrap();
        let second = a.place_live(&PlaceOrderRequest::from(&order())).await.unwrap();
        assert_eq!(first.exchange_order_id, second.exchange_order_id);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockVenueClient::new();
        client
            .scripted_failures
            .lock()
            .push(VenueError::NetworkTransient("timeout".into()));
        let a = adapter_with_clock(client, true, dir.path(), Arc::new(SystemClock));
        let ack = a.place_live(&PlaceOrderRequest::from(&order())).await.unwrap();
        assert!(!ack.exchange_order_id.is_empty());
    }

    #[tokio::test]
    async fn halted_kill_switch_blocks_placement() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = dir.path().join("halt");
        std::fs::write(&sentinel, b"").unwrap();
        let ks = Arc::new(KillSwitch::new(&sentinel, "halt", Arc::new(InMemorySharedState::default())));
        ks.poll_once().await.unwrap();
        let bus = Bus::new();
        let journal = Journal::new(dir.path(), "broker.echo", None);
        let a = BrokerAdapter::new(
            MockVenueClient::new(),
            ks,
            BrokerConfig::default(),
            bus,
            journal,
            Arc::new(FixedClock::new(0)),
        );
        let result = a.place(&order()).await;
        assert!(matches!(result, Err(BrokerError::Halted)));
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let base = Duration::from_millis(200);
        let max = Duration::from_millis(1_000);
        assert_eq!(exponential_backoff(base, 1, max), Duration::from_millis(200));
        assert_eq!(exponential_backoff(base, 2, max), Duration::from_millis(400));
        assert_eq!(exponential_backoff(base, 3, max), Duration::from_millis(800));
        assert_eq!(exponential_backoff(base, 4, max), max);
    }
}
