//! Immutable record types and the [`Clock`] capability shared by every Njord
//! service. Nothing in this crate touches the filesystem, the network, or
//! wall-clock time directly — components depend on `Clock` so backtests and
//! unit tests can inject [`FixedClock`].

pub mod clock;
pub mod meta_store;
pub mod model;

pub use clock::{Clock, FixedClock, SystemClock};
pub use meta_store::IntentMetaStore;
pub use model::*;
