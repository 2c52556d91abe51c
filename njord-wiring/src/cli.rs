use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Njord — core of the algorithmic trading platform.
#[derive(Debug, Parser)]
#[command(name = "njord", version, about)]
pub struct Cli {
    /// Path to the base config YAML.
    #[arg(long, default_value = "config/base.yaml", global = true)]
    pub config: PathBuf,

    /// Path to an environment-specific overlay YAML.
    #[arg(long, global = true)]
    pub env_overlay: Option<PathBuf>,

    /// Path to an (already-decrypted) secrets overlay YAML.
    #[arg(long, global = true)]
    pub secrets_overlay: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a named service (or every registered service if omitted).
    Start {
        service: Option<String>,
    },
    /// Request a running service to stop gracefully.
    Stop {
        service: String,
    },
    /// Kill-switch operations.
    Killswitch {
        #[command(subcommand)]
        action: KillswitchAction,
    },
    /// Follow the journal file backing a bus topic as it grows.
    Tail {
        topic: String,
        #[arg(long, default_value = "var/log/njord")]
        journal_dir: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum KillswitchAction {
    Trip,
    Reset,
}
