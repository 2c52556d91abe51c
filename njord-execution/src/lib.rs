//! Execution algorithms (spec §4.H): a parent `OrderIntent` carrying
//! `algo_type != none` never reaches the Broker Adapter directly. It is
//! planned into child `OrderIntent`s ("slices"), each routed back through
//! `strat.intent` so the Risk Engine evaluates every one exactly as it
//! would a strategy-originated intent. Fills are tracked by subscribing to
//! `fills.new` filtered by `meta.execution_id`/`intent_id == slice_id`.

pub mod conservation;
pub mod error;
pub mod executor;
pub mod iceberg;
pub mod pov;
pub mod slice;
pub mod twap;
pub mod vwap;

pub use error::ExecutionError;
pub use executor::{ExecutionContext, FillAccumulator};
pub use slice::{Slice, SliceStatus};
