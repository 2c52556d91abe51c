use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Staleness threshold for the last-trade reference price cache (spec §4.E):
/// prices older than this deny with `stale_reference`.
pub const STALE_AFTER_NS: i64 = 30_000_000_000;

/// Last-trade cache keyed by symbol, written by the market-data ingest path
/// and read by the Risk Engine to price notional caps.
#[derive(Debug, Default)]
pub struct ReferencePriceCache {
    prices: Mutex<HashMap<String, (Decimal, i64)>>,
}

impl ReferencePriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, symbol: &str, price: Decimal, ts_ns: i64) {
        self.prices.lock().insert(symbol.to_string(), (price, ts_ns));
    }

    /// Returns `Some(price)` if a reference price exists for `symbol` and is
    /// no older than [`STALE_AFTER_NS`] relative to `now_ns`.
    pub fn get(&self, symbol: &str, now_ns: i64) -> Option<Decimal> {
        let guard = self.prices.lock();
        let (price, ts_ns) = guard.get(symbol)?;
        if now_ns - ts_ns > STALE_AFTER_NS {
            None
        } else {
            Some(*price)
        }
    }
}
