//! Broker Adapter (spec §4.G): wraps a venue client behind idempotent
//! placement, REST retry with backoff, and user-stream reconciliation. Two
//! safety gates sit in front of any live placement: the kill-switch, and a
//! process-level `live_enabled` flag derived from config AND an explicit
//! environment variable.

mod adapter;
mod client;
mod error;
mod user_stream;

pub use adapter::{BrokerAdapter, BrokerConfig, Halts};
pub use client::{MockVenueClient, PlaceOrderRequest, VenueClient, VenueError};
pub use error::BrokerError;
pub use user_stream::reconcile_user_stream;
