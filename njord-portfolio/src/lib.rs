//! Portfolio Tracker (spec §4.J): maintains per-strategy capital and
//! position from `fills.new`, emits a [`njord_core::PositionSnapshot`] on
//! every change, and publishes a corrective rebalance plan to `strat.intent`
//! when a strategy's allocation drifts from its targets.

mod error;
mod position;
mod rebalance;
mod tracker;

pub use error::PortfolioError;
pub use position::PositionState;
pub use rebalance::{DriftLine, TargetAllocations};
pub use tracker::PortfolioTracker;
