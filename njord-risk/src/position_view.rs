use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Read-only view of net position the Risk Engine consults to project the
/// post-fill position cap (spec §4.E step 4). The Portfolio Tracker owns
/// the authoritative table and updates this view via `positions.snapshot`;
/// the Risk Engine never holds it by shared memory (spec §5).
pub trait PositionView: Send + Sync {
    fn net_qty(&self, strategy_id: &str, symbol: &str) -> Decimal;
}

#[derive(Debug, Default)]
pub struct InMemoryPositionView {
    positions: Mutex<HashMap<(String, String), Decimal>>,
}

impl InMemoryPositionView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, strategy_id: &str, symbol: &str, net_qty: Decimal) {
        self.positions
            .lock()
            .insert((strategy_id.to_string(), symbol.to_string()), net_qty);
    }
}

impl PositionView for InMemoryPositionView {
    fn net_qty(&self, strategy_id: &str, symbol: &str) -> Decimal {
        self.positions
            .lock()
            .get(&(strategy_id.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
