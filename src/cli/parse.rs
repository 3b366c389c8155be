//! CLI parse: clap types for Standby. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Standby CLI - durable offline action queue
#[derive(Parser)]
#[command(name = "standby")]
#[command(about = "Queue actions while offline and replay them when connectivity returns")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append an action to the queue
    Enqueue {
        /// Action kind (selects the handler on replay)
        kind: String,
        /// JSON payload (default: null)
        #[arg(long)]
        payload: Option<String>,
    },
    /// List pending actions in replay order
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show queue counts, store location and configured endpoints
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove one pending action by id
    Remove {
        /// Action id (as shown by `list`)
        id: String,
    },
    /// Remove every pending action
    Clear,
    /// Replay pending actions against the configured endpoints
    Drain {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Inspect or recover dead-lettered actions
    DeadLetters {
        #[command(subcommand)]
        command: DeadLetterCommands,
    },
}

#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dead-lettered actions
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Move every dead-lettered action back to the pending queue
    Requeue,
    /// Discard every dead-lettered action
    Purge,
}
