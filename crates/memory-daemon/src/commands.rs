//! Command implementations for the memory daemon.
//!
//! Handles:
//! - run: load memory, seed, initial sync, periodic sync until Ctrl-C
//! - sync / query / remember: one-shot operations against the memory
//! - status / notes / backups: read-only inspection and backup restore

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use memory_corpus::{DocumentSource, UnicodeSegmenter};
use memory_embeddings::{EmbeddingModel, LocalEmbedder, ModelCache};
use memory_scheduler::{create_sync_job, SchedulerConfig, SchedulerService, SyncJobConfig};
use memory_service::MemoryService;
use memory_storage::{LoadOutcome, MemoryPersistence, SnapshotPersistence};
use memory_types::{Origin, Settings};

use crate::cli::{BackupCommands, Cli, NotesCommands};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(vault) = &cli.vault {
        settings.corpus.root = vault.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        settings.data_dir = data_dir.clone();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load the embedding model, downloading it on first use.
async fn load_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingModel>> {
    let cache = ModelCache::for_repo(settings.embedding.model_repo.clone());
    info!(repo = %cache.repo_id, path = ?cache.model_dir(), "Loading embedding model");

    let embedder = tokio::task::spawn_blocking(move || LocalEmbedder::load(&cache))
        .await
        .context("Model loading task failed")?
        .context("Failed to load embedding model")?;
    Ok(Arc::new(embedder))
}

async fn open_service(settings: &Settings) -> Result<Arc<MemoryService>> {
    let embedder = load_embedder(settings).await?;
    let service = tokio::task::block_in_place(|| {
        MemoryService::load(settings, embedder, Arc::new(UnicodeSegmenter))
    });
    Ok(Arc::new(service))
}

/// Run the daemon in the foreground.
///
/// 1. Load the memory file and the embedding model
/// 2. Seed personal memory from `seed_text`, if configured
/// 3. Run an initial sync pass
/// 4. Sync periodically until SIGINT/SIGTERM
pub async fn run_daemon(
    settings: Settings,
    interval_override: Option<u64>,
    initial_sync: bool,
) -> Result<()> {
    info!("Memory daemon starting...");
    info!("Configuration:");
    info!("  Vault: {}", settings.corpus_root().display());
    info!("  Memory file: {}", settings.memory_path().display());
    info!("  Backups: {}", settings.backup_path().display());
    info!("  Log level: {}", settings.log_level);

    let service = open_service(&settings).await?;

    if let Some(seed) = settings.seed_text.as_deref() {
        match service.seed_personal(seed).await {
            Ok(0) => {}
            Ok(added) => info!(added, "Seeded personal memories"),
            Err(e) => warn!(error = %e, "Failed to seed personal memories"),
        }
    }

    if initial_sync {
        // A failed initial pass is retried by the periodic job
        match service.sync_report().await {
            Ok(report) => info!(
                chunks_added = report.chunks_added,
                documents = report.documents,
                "Initial sync complete"
            ),
            Err(e) => warn!(error = %e, "Initial sync failed"),
        }
    }

    let scheduler = SchedulerService::new(SchedulerConfig::default());
    let job_config = SyncJobConfig::default()
        .with_interval(interval_override.unwrap_or(settings.sync.interval_secs))
        .with_retry_backoff(settings.sync.retry_backoff_secs);
    create_sync_job(&scheduler, service.clone(), job_config)
        .await
        .context("Failed to register sync job")?;
    scheduler.start().await.context("Failed to start scheduler")?;

    shutdown_signal().await;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;
    info!("Memory daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Run one sync pass.
pub async fn run_sync(settings: Settings) -> Result<()> {
    let service = open_service(&settings).await?;
    let report = service.sync_report().await.context("Sync failed")?;

    if report.rebuilt {
        println!(
            "Synced {} documents: {} added, {} modified, {} deleted files; {} chunks embedded",
            report.documents,
            report.added_files,
            report.modified_files,
            report.deleted_files,
            report.chunks_added
        );
    } else {
        println!("Corpus unchanged, nothing to do");
    }
    Ok(())
}

/// Print the memories most similar to `text`.
pub async fn run_query(settings: Settings, text: &str, top_k: Option<usize>) -> Result<()> {
    let k = top_k.unwrap_or(settings.top_k);
    let service = open_service(&settings).await?;
    let recall = service.recall(text, k).await;

    if recall.is_empty() {
        println!("No memories found");
        return Ok(());
    }
    if !recall.personal.is_empty() {
        println!("Personal:");
        for memory in &recall.personal {
            println!("  - {}", memory);
        }
    }
    if !recall.corpus.is_empty() {
        println!("Notes:");
        for memory in &recall.corpus {
            println!("  - {}", memory.replace('\n', "\n    "));
        }
    }
    Ok(())
}

/// Store a personal memory.
pub async fn run_remember(settings: Settings, text: &str) -> Result<()> {
    let service = open_service(&settings).await?;
    service
        .add_personal(text)
        .await
        .context("Failed to store memory")?;
    println!("Remembered: {}", text.trim());
    Ok(())
}

/// Show memory status from the files on disk.
///
/// Reads the memory file directly so no model has to be loaded.
pub fn show_status(settings: &Settings) -> Result<()> {
    let memory = MemoryPersistence::new(
        settings.memory_path(),
        settings.backup_path(),
        settings.embedding.dimension,
    );
    let snapshot = SnapshotPersistence::new(settings.snapshot_path()).load_or_default();

    println!("Memory file: {}", memory.path().display());
    match memory.load() {
        LoadOutcome::Loaded(store) => {
            println!(
                "  {} records ({} personal, {} from notes), dimension {}",
                store.size(),
                store.count_by_origin(Origin::Personal),
                store.count_by_origin(Origin::Corpus),
                store.dimension()
            );
        }
        LoadOutcome::Absent => println!("  not created yet"),
        LoadOutcome::Corrupt { reason } => {
            println!("  CORRUPT: {}", reason);
            println!("  Run `memory-daemon backups restore` to recover");
        }
    }

    println!("Vault: {}", settings.corpus_root().display());
    println!("  {} files tracked", snapshot.len());

    let backups = memory.list_backups().context("Failed to list backups")?;
    println!("Backups: {}", memory.backup_dir().display());
    match backups.first() {
        Some(newest) => println!("  {} backups, newest {}", backups.len(), newest.created),
        None => println!("  none"),
    }
    Ok(())
}

/// Handle `notes` subcommands.
pub fn handle_notes(settings: &Settings, command: NotesCommands) -> Result<()> {
    let source = DocumentSource::new(settings.corpus_root(), settings.corpus.extensions.clone());

    match command {
        NotesCommands::Latest { limit } => {
            let notes = source.latest(limit).context("Failed to read vault")?;
            if notes.is_empty() {
                println!("No notes found");
            }
            for note in notes {
                println!(
                    "{}  {} ({})",
                    note.modified.format("%Y-%m-%d %H:%M"),
                    note.title,
                    note.path.display()
                );
                println!("    {}", note.preview.replace('\n', " "));
            }
        }
        NotesCommands::Search { query } => {
            let found = source
                .find_by_title(&query)
                .context("Failed to read vault")?;
            if found.is_empty() {
                println!("No notes matching '{}'", query);
            }
            for document in found {
                println!("{} ({})", document.title, document.path.display());
            }
        }
    }
    Ok(())
}

/// Handle `backups` subcommands.
pub fn handle_backups(settings: &Settings, command: BackupCommands) -> Result<()> {
    let memory = MemoryPersistence::new(
        settings.memory_path(),
        settings.backup_path(),
        settings.embedding.dimension,
    )
    .with_retention(settings.backup_retention);

    match command {
        BackupCommands::List => {
            let backups = memory.list_backups().context("Failed to list backups")?;
            if backups.is_empty() {
                println!("No backups in {}", memory.backup_dir().display());
            }
            for backup in backups {
                println!("{}  {}", backup.created, backup.path.display());
            }
        }
        BackupCommands::Restore => {
            let restored = memory
                .restore_latest_backup()
                .context("Failed to restore backup")?;
            println!("Restored {} from {}", memory.path().display(), restored.display());
        }
    }
    Ok(())
}
