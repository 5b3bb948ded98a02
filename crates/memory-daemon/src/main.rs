//! Memory Vault Daemon
//!
//! Keeps a semantic memory of a notes vault in sync and answers queries
//! against it.
//!
//! # Usage
//!
//! ```bash
//! memory-daemon run [--interval SECS] [--no-initial-sync]
//! memory-daemon sync
//! memory-daemon query "what tea do I like" [-k 5]
//! memory-daemon remember "I drink oolong"
//! memory-daemon status
//! memory-daemon notes latest [-n 5]
//! memory-daemon notes search <title>
//! memory-daemon backups list|restore
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/memory-vault/config.toml)
//! 3. Environment variables (MEMORY_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use memory_daemon::{
    handle_backups, handle_notes, init_logging, load_settings, run_daemon, run_query,
    run_remember, run_sync, show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Run {
            interval,
            no_initial_sync,
        } => {
            run_daemon(settings, interval, !no_initial_sync).await?;
        }
        Commands::Sync => {
            run_sync(settings).await?;
        }
        Commands::Query { text, top_k } => {
            run_query(settings, &text, top_k).await?;
        }
        Commands::Remember { text } => {
            run_remember(settings, &text).await?;
        }
        Commands::Status => {
            show_status(&settings)?;
        }
        Commands::Notes { command } => {
            handle_notes(&settings, command)?;
        }
        Commands::Backups { command } => {
            handle_backups(&settings, command)?;
        }
    }

    Ok(())
}
