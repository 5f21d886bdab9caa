pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pagefeed")]
#[command(about = "Turn HTML pages into RSS feeds", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/pagefeed/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of parallel workers for fetching pages
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every target and write its feed
    Run,
    /// Validate the configuration without fetching anything
    Check,
    /// Delete cached pages older than the cache lifetime
    Purge,
}
