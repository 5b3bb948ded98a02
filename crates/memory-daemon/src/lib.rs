//! Memory daemon library exports.
//!
//! This crate provides the CLI daemon binary for the memory-vault system.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, sync, query, remember, ...)

pub mod cli;
pub mod commands;

pub use cli::{BackupCommands, Cli, Commands, NotesCommands};
pub use commands::{
    handle_backups, handle_notes, init_logging, load_settings, run_daemon, run_query,
    run_remember, run_sync, show_status,
};
