//! Strategy Host (spec §4.I): loads strategy descriptors from config,
//! dispatches each bus event to every strategy whose topic pattern matches,
//! and publishes the intents they return to `strat.intent`. A strategy
//! panic or error is logged and isolated — it never blocks its siblings.

mod context;
mod error;
mod host;
mod strategy;

pub use context::{Context, Params};
pub use error::StrategyError;
pub use host::StrategyHost;
pub use strategy::{Strategy, StrategyDescriptor};
