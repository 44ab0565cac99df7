//! CLI argument definitions for logsieve-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// logsieve log filtering daemon.
///
/// Tails the host application's log, sorts lines into per-rule histories
/// and keeps them persisted between restarts.
#[derive(Parser, Debug)]
#[command(name = "logsieve-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logsieve.toml configuration file.
    #[arg(short, long, default_value = "/etc/logsieve/logsieve.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
