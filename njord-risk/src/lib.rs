//! Risk Engine (spec §4.E): evaluates every [`OrderIntent`] against a fixed
//! guard order, short-circuiting on first denial, and never calls the
//! broker directly — it only ever emits a [`RiskDecision`] (always) and an
//! [`OrderEvent`] (iff allowed) for downstream publication.

mod engine;
mod error;
mod position_view;
mod rate_limiter;
mod reference_price;

pub use engine::{RiskConfig, RiskEngine, RiskOutcome};
pub use error::RiskError;
pub use position_view::{InMemoryPositionView, PositionView};
pub use rate_limiter::RateLimiter;
pub use reference_price::ReferencePriceCache;

pub use njord_core::{OrderEvent, OrderIntent, RiskDecision};
