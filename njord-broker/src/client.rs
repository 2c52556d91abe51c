use async_trait::async_trait;
use njord_core::{BrokerOrderAck, BrokerOrderUpdate, OrderEvent, OrderType, Side};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::{collections::HashMap, time::Duration};

/// Errors classified per spec §6: {network-transient, rate-limited,
/// duplicate-client-id, permanent}.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VenueError {
    #[error("network transient error: {0}")]
    NetworkTransient(String),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("duplicate client_order_id {0}")]
    DuplicateClientId(String),

    #[error("permanent venue error: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderType,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
}

impl From<&OrderEvent> for PlaceOrderRequest {
    fn from(order: &OrderEvent) -> Self {
        Self {
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            kind: order.kind,
            qty: order.qty,
            limit_price: order.limit_price,
        }
    }
}

/// Venue client interface consumed by the Broker Adapter (spec §6).
#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn create_order(&self, req: &PlaceOrderRequest) -> Result<BrokerOrderAck, VenueError>;
    async fn cancel_order(&self, exchange_order_id: &str) -> Result<bool, VenueError>;
    async fn fetch_order(&self, client_order_id: &str) -> Result<BrokerOrderAck, VenueError>;
    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<BrokerOrderUpdate>, VenueError>;
    async fn fetch_balances(&self) -> Result<HashMap<String, Decimal>, VenueError>;
}

/// In-memory venue fake used in tests and the simulation harness. Tracks
/// placed orders by `client_order_id` so a second `create_order` with the
/// same id surfaces `DuplicateClientId`, exercising the adapter's
/// idempotent-replay path without a real venue.
#[derive(Debug, Default)]
pub struct MockVenueClient {
    orders: Mutex<HashMap<String, BrokerOrderAck>>,
    next_exchange_id: Mutex<u64>,
    /// Queue of scripted transient failures to return before succeeding,
    /// consumed in order, for exercising the retry/backoff path.
    pub scripted_failures: Mutex<Vec<VenueError>>,
}

impl MockVenueClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VenueClient for MockVenueClient {
    async fn create_order(&self, req: &PlaceOrderRequest) -> Result<BrokerOrderAck, VenueError> {
        if let Some(existing) = self.orders.lock().get(&req.client_order_id) {
            return Err(VenueError::DuplicateClientId(existing.exchange_order_id.clone()));
        }
        if let Some(failure) = self.scripted_failures.lock().pop() {
            return Err(failure);
        }
        let exchange_order_id = {
            let mut next = self.next_exchange_id.lock();
            *next += 1;
            format!("x{next}")
        };
        let ack = BrokerOrderAck {
            client_order_id: req.client_order_id.clone(),
            exchange_order_id,
            ts_ns: 0,
        };
        self.orders.lock().insert(req.client_order_id.clone(), ack.clone());
        Ok(ack)
    }

    async fn cancel_order(&self, _exchange_order_id: &str) -> Result<bool, VenueError> {
        Ok(true)
    }

    async fn fetch_order(&self, client_order_id: &str) -> Result<BrokerOrderAck, VenueError> {
        self.orders
            .lock()
            .get(client_order_id)
            .cloned()
            .ok_or_else(|| VenueError::Permanent("order not found".to_string()))
    }

    async fn fetch_open_orders(&self, _symbol: Option<&str>) -> Result<Vec<BrokerOrderUpdate>, VenueError> {
        Ok(Vec::new())
    }

    async fn fetch_balances(&self) -> Result<HashMap<String, Decimal>, VenueError> {
        Ok(HashMap::new())
    }
}
