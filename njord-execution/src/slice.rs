use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SliceStatus {
    Scheduled,
    Sent,
    PartiallyFilled,
    Filled,
    Cancelled,
    TimedOut,
}

impl SliceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SliceStatus::Filled | SliceStatus::Cancelled | SliceStatus::TimedOut)
    }
}

/// A single child order within a parent execution (spec §4.H shared
/// contracts). `slice_id` is `execution_id || idx`, stable across replans
/// of the same index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slice {
    pub execution_id: String,
    pub slice_id: String,
    pub idx: u32,
    pub scheduled_ts_ns: i64,
    pub qty: Decimal,
    pub limit_price: Option<Decimal>,
    pub status: SliceStatus,
    pub filled_qty: Decimal,
    /// Flagged when this slice was appended to absorb rounding residue
    /// outside the normal plan (VWAP replan, POV catch-up).
    pub residual: bool,
}

impl Slice {
    pub fn new(execution_id: &str, idx: u32, scheduled_ts_ns: i64, qty: Decimal, limit_price: Option<Decimal>) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            slice_id: slice_id(execution_id, idx),
            idx,
            scheduled_ts_ns,
            qty,
            limit_price,
            status: SliceStatus::Scheduled,
            filled_qty: Decimal::ZERO,
            residual: false,
        }
    }

    /// Partial-fill detection uses `filled_qty < planned_qty * 0.999`, not
    /// "any fill", to avoid prematurely marking a slice complete (spec
    /// §4.H VWAP step 5, applied uniformly to every algorithm).
    pub fn is_materially_filled(&self) -> bool {
        self.qty > Decimal::ZERO && self.filled_qty >= self.qty * Decimal::new(999, 3)
    }
}

pub fn slice_id(execution_id: &str, idx: u32) -> String {
    format!("{execution_id}-{idx}")
}
