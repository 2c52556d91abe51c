//! Wiring (spec §4.L): layered config loading and strict validation, the
//! CLI surface, and the glue loops that connect each component crate's
//! primitive operations into the running pipeline.

pub mod cli;
pub mod config;
pub mod error;
pub mod stop_signal;
pub mod tail;
pub mod validate;
pub mod wiring;

pub use config::{load_layered, AppConfig, Secrets};
pub use error::ConfigError;
pub use validate::validate;
