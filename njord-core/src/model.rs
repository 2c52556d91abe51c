//! Immutable data-model records from spec §3. Every record implements
//! `Clone + PartialEq` so subscribers can cheaply copy-by-value (per the
//! ownership model in spec §9: fills are shared-by-value, never by
//! reference, across task boundaries).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arbitrary JSON-ish metadata attached to an intent/order/fill, carrying
/// execution provenance (`execution_id`, `slice_id`, `algo_type`, ...).
pub type Meta = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub price: Decimal,
    pub qty: Decimal,
    pub side: Side,
    pub ts_ns: i64,
    pub trade_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    S1,
    M1,
    M5,
    M15,
    H1,
    D1,
}

impl Timeframe {
    pub fn duration_ns(self) -> i64 {
        const SEC: i64 = 1_000_000_000;
        match self {
            Timeframe::S1 => SEC,
            Timeframe::M1 => 60 * SEC,
            Timeframe::M5 => 5 * 60 * SEC,
            Timeframe::M15 => 15 * 60 * SEC,
            Timeframe::H1 => 3_600 * SEC,
            Timeframe::D1 => 86_400 * SEC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub ts_open_ns: i64,
    pub ts_close_ns: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BarInvariantError {
    #[error("low {low} must be <= open {open} and close {close}")]
    LowTooHigh { low: Decimal, open: Decimal, close: Decimal },
    #[error("high {high} must be >= open {open} and close {close}")]
    HighTooLow { high: Decimal, open: Decimal, close: Decimal },
    #[error("volume must be non-negative, got {0}")]
    NegativeVolume(Decimal),
    #[error("ts_close_ns - ts_open_ns ({actual}) does not match timeframe duration ({expected})")]
    BadDuration { actual: i64, expected: i64 },
}

impl OhlcvBar {
    pub fn validate(&self) -> Result<(), BarInvariantError> {
        if self.low > self.open || self.low > self.close {
            return Err(BarInvariantError::LowTooHigh {
                low: self.low,
                open: self.open,
                close: self.close,
            });
        }
        if self.high < self.open || self.high < self.close {
            return Err(BarInvariantError::HighTooLow {
                high: self.high,
                open: self.open,
                close: self.close,
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(BarInvariantError::NegativeVolume(self.volume));
        }
        let actual = self.ts_close_ns - self.ts_open_ns;
        let expected = self.timeframe.duration_ns();
        if actual != expected {
            return Err(BarInvariantError::BadDuration { actual, expected });
        }
        Ok(())
    }

    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub intent_id: String,
    pub ts_ns: i64,
    pub strategy_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub kind: OrderType,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub meta: Meta,
}

impl OrderIntent {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }

    pub fn algo_type(&self) -> Option<&str> {
        self.meta_str("algo_type")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub intent_id: String,
    pub allowed: bool,
    pub reason: Option<String>,
    pub ts_ns: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub intent_id: String,
    pub client_order_id: String,
    pub venue: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub kind: OrderType,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
    pub ts_ns: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub client_order_id: String,
    pub intent_id: String,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub ts_ns: i64,
    #[serde(default)]
    pub meta: Meta,
}

/// Published on `orders.cancel`. Spec §6 names the topic but the §3 data
/// model doesn't define its wire shape; this closes that gap with the
/// minimum needed to identify the order to cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub client_order_id: String,
    pub intent_id: String,
    pub ts_ns: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrderAck {
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub ts_ns: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BrokerOrderStatus {
    New,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrderUpdate {
    pub exchange_order_id: String,
    pub status: BrokerOrderStatus,
    pub filled_qty: Decimal,
    pub avg_price: Decimal,
    pub ts_ns: i64,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub strategy_id: String,
    pub symbol: String,
    pub net_qty: Decimal,
    pub avg_entry: Decimal,
    pub realized_pnl: Decimal,
    pub ts_ns: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: String,
    pub symbol: String,
    pub total_qty: Decimal,
    pub filled_qty: Decimal,
    pub avg_fill_price: Decimal,
    pub total_fees: Decimal,
    pub slices_completed: u32,
    pub slices_total: u32,
    pub status: ExecutionStatus,
    pub start_ts_ns: i64,
    pub end_ts_ns: Option<i64>,
}

/// Deterministic idempotency key derivation for [`OrderEvent::client_order_id`]:
/// a client-order-id must be stable across retries of the same intent.
pub fn client_order_id(intent_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"njord:intent:");
    hasher.update(intent_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
