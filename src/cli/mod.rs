//! Command-line surface (§5 Ambient stack — CLI)
//!
//! A thin `clap`-derived wrapper over the library's public API: one
//! top-level parser holding a config path plus a subcommand enum, each
//! subcommand delegating straight into `cli::commands`.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "confluence-watch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler loop (ingest, discover, stats, monitor, watchlist)
    Run,

    /// Print last-run timestamps per job and current watchlist size
    Status,

    /// Print the resolved configuration
    ShowConfig,

    /// List the current top-N watchlist per chain
    Watchlist,
}
