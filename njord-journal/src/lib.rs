//! Append-only line-delimited JSON journal, one file per (topic, symbol,
//! date) (spec §4.B, §6). Durability guarantee: caller-visible success
//! means bytes are in the OS buffer — no fsync is required per write.

mod compaction;
mod error;
mod journal;
mod reader;

pub use compaction::compact;
pub use error::JournalError;
pub use journal::Journal;
pub use reader::{read, JournalReader};
