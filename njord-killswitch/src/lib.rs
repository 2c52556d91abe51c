//! Dual-sourced latching kill-switch (spec §4.D): `tripped() = file_exists
//! OR state_key_set`. Any trip latches for the process lifetime until
//! [`KillSwitch::reset`] clears both sources. Reading `tripped()` is cheap
//! (an atomic load against a background-maintained cache with ≤ 1 s
//! staleness); only the poller task touches the filesystem / shared state.

mod error;
mod shared_state;
mod switch;

pub use error::KillSwitchError;
pub use shared_state::{InMemorySharedState, SharedState};
pub use switch::KillSwitch;
