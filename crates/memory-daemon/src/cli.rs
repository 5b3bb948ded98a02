//! CLI argument parsing for the memory daemon.
//!
//! CLI flags override every other config source.

use clap::{Parser, Subcommand};

/// Memory Vault Daemon
///
/// Keeps a semantic memory of a notes vault in sync and answers queries
/// against it.
#[derive(Parser, Debug)]
#[command(name = "memory-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/memory-vault/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the notes vault root
    #[arg(long, global = true)]
    pub vault: Option<String>,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run in the foreground: initial sync, then periodic sync until Ctrl-C
    Run {
        /// Override the sync interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Skip the sync pass at startup
        #[arg(long)]
        no_initial_sync: bool,
    },

    /// Run one sync pass and exit
    Sync,

    /// Retrieve the memories most similar to a query
    Query {
        /// Query text
        text: String,

        /// Number of memories (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Store a personal memory
    Remember {
        /// Fact to remember
        text: String,
    },

    /// Show memory status
    Status,

    /// Browse notes in the vault
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },

    /// Manage memory file backups
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

/// Notes subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum NotesCommands {
    /// List the most recently modified notes
    Latest {
        /// Maximum results
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },

    /// Find notes whose title contains the query
    Search {
        /// Title substring (case-insensitive)
        query: String,
    },
}

/// Backup subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum BackupCommands {
    /// List backups, newest first
    List,

    /// Replace the memory file with the newest valid backup
    Restore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run() {
        let cli = Cli::parse_from(["memory-daemon", "run"]);
        match cli.command {
            Commands::Run {
                interval,
                no_initial_sync,
            } => {
                assert_eq!(interval, None);
                assert!(!no_initial_sync);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_with_interval() {
        let cli = Cli::parse_from(["memory-daemon", "run", "-i", "30", "--no-initial-sync"]);
        match cli.command {
            Commands::Run {
                interval,
                no_initial_sync,
            } => {
                assert_eq!(interval, Some(30));
                assert!(no_initial_sync);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["memory-daemon", "--config", "/path/to/config.toml", "sync"]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert!(matches!(cli.command, Commands::Sync));
    }

    #[test]
    fn test_cli_global_overrides_after_subcommand() {
        let cli = Cli::parse_from([
            "memory-daemon",
            "status",
            "--vault",
            "/notes",
            "--data-dir",
            "/data",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.vault, Some("/notes".to_string()));
        assert_eq!(cli.data_dir, Some("/data".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_query() {
        let cli = Cli::parse_from(["memory-daemon", "query", "what tea do I like", "-k", "3"]);
        match cli.command {
            Commands::Query { text, top_k } => {
                assert_eq!(text, "what tea do I like");
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_remember() {
        let cli = Cli::parse_from(["memory-daemon", "remember", "I drink oolong"]);
        match cli.command {
            Commands::Remember { text } => assert_eq!(text, "I drink oolong"),
            _ => panic!("Expected Remember command"),
        }
    }

    #[test]
    fn test_cli_notes_latest_default() {
        let cli = Cli::parse_from(["memory-daemon", "notes", "latest"]);
        match cli.command {
            Commands::Notes {
                command: NotesCommands::Latest { limit },
            } => assert_eq!(limit, 5),
            _ => panic!("Expected Notes Latest command"),
        }
    }

    #[test]
    fn test_cli_notes_search() {
        let cli = Cli::parse_from(["memory-daemon", "notes", "search", "alpha"]);
        match cli.command {
            Commands::Notes {
                command: NotesCommands::Search { query },
            } => assert_eq!(query, "alpha"),
            _ => panic!("Expected Notes Search command"),
        }
    }

    #[test]
    fn test_cli_backups() {
        let cli = Cli::parse_from(["memory-daemon", "backups", "restore"]);
        assert!(matches!(
            cli.command,
            Commands::Backups {
                command: BackupCommands::Restore
            }
        ));
    }
}
