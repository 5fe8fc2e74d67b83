// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Build the settings (defaults < config file < flags)
// 3. Open the bookmarks file and the stored backup
// 4. Dispatch to the subcommand handler
// 5. Exit with a proper code:
//      0 = success
//      1 = dead bookmarks found
//      2 = error
//      3 = declined (no backup to restore, --yes missing, already running)
// =============================================================================

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use bookmark_guardian::bookmarks::{flatten, BookmarkStore, JsonFileStore};
use bookmark_guardian::checker::{HttpProbe, RunOutcome, Stats};
use bookmark_guardian::config::{RemovalMode, Settings};
use bookmark_guardian::logging;
use bookmark_guardian::run::{Event, EventBus, RunController, StartOutcome};
use bookmark_guardian::snapshot::{FileStorage, RestoreOutcome, SnapshotManager};
use cli::{Cli, Commands};

const EXIT_OK: i32 = 0;
const EXIT_DEAD_FOUND: i32 = 1;
const EXIT_ERROR: i32 = 2;
const EXIT_DECLINED: i32 = 3;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let settings = load_settings(&cli)?;
    let engine = Engine::open(&settings).await?;

    match cli.command {
        Commands::Status { json } => handle_status(&engine, json).await,
        Commands::Backup { output } => handle_backup(&engine, output.as_deref()).await,
        Commands::Check { json, .. } => handle_check(&engine, json).await,
        Commands::Restore { from, yes } => handle_restore(&engine, &settings, from.as_deref(), yes).await,
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => {
            Settings::load(path).with_context(|| format!("failed to read config file {}", path.display()))?
        }
        None => Settings::default(),
    };

    if let Some(path) = &cli.bookmarks {
        settings.bookmarks_path = path.clone();
    }
    if let Some(path) = &cli.state {
        settings.state_path = path.clone();
    }
    if let Commands::Check {
        batch_size,
        delay_ms,
        report_only,
        ..
    } = &cli.command
    {
        if let Some(size) = batch_size {
            settings.batch_size = *size;
        }
        if let Some(ms) = delay_ms {
            settings.batch_delay = Duration::from_millis(*ms);
        }
        if *report_only {
            settings.mode = RemovalMode::ReportOnly;
        }
    }

    settings.validate().context("invalid settings")?;
    Ok(settings)
}

// Everything one command needs, wired together.
struct Engine {
    store: Arc<JsonFileStore>,
    snapshots: Arc<SnapshotManager>,
    controller: Arc<RunController>,
}

impl Engine {
    async fn open(settings: &Settings) -> Result<Self> {
        let store = Arc::new(
            JsonFileStore::open(&settings.bookmarks_path)
                .await
                .with_context(|| format!("failed to open bookmarks file {}", settings.bookmarks_path.display()))?,
        );
        let storage = Arc::new(FileStorage::new(&settings.state_path));
        let events = EventBus::default();

        let snapshots = Arc::new(SnapshotManager::new(store.clone(), storage, events.clone()));
        snapshots
            .load()
            .await
            .with_context(|| format!("failed to read stored backup from {}", settings.state_path.display()))?;

        let probe = Arc::new(HttpProbe::from_settings(settings).context("failed to build HTTP client")?);
        let controller = Arc::new(RunController::from_settings(
            store.clone(),
            probe,
            snapshots.clone(),
            events,
            settings,
        ));

        Ok(Engine {
            store,
            snapshots,
            controller,
        })
    }
}

async fn handle_status(engine: &Engine, json: bool) -> Result<i32> {
    let status = engine.controller.status().await;
    let bookmarks = flatten(&engine.store.get_tree().await?).count();
    let latest = engine.snapshots.latest().await;

    if json {
        let mut value = serde_json::to_value(status)?;
        value["bookmarks"] = serde_json::json!(bookmarks);
        value["backupTimestamp"] = serde_json::json!(latest.as_ref().map(|s| s.captured_at.timestamp_millis()));
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(EXIT_OK);
    }

    println!("📚 Bookmarks: {} in {}", bookmarks, engine.store.path().display());
    match latest {
        Some(snapshot) => println!(
            "💾 Backup: {} bookmark(s), taken {}",
            snapshot.bookmark_count(),
            snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("💾 Backup: none yet (one is taken before the first check)"),
    }
    Ok(EXIT_OK)
}

async fn handle_backup(engine: &Engine, output: Option<&std::path::Path>) -> Result<i32> {
    let snapshot = engine.snapshots.capture().await?;
    println!("💾 Backup created: {} bookmark(s)", snapshot.bookmark_count());

    if let Some(path) = output {
        SnapshotManager::export(&snapshot, path)
            .await
            .with_context(|| format!("failed to write backup to {}", path.display()))?;
        println!("📄 Exported to {}", path.display());
    }
    Ok(EXIT_OK)
}

async fn handle_check(engine: &Engine, json: bool) -> Result<i32> {
    // Subscribe before starting so no event is missed.
    let printer = tokio::spawn(print_events(engine.controller.events().subscribe(), json));

    let controller = engine.controller.clone();
    let stopper = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⏹️  Stopping after the current batch...");
            controller.request_stop().await;
        }
    });

    let outcome = engine.controller.start().await;
    stopper.abort();

    let (outcome, stats) = match outcome {
        StartOutcome::AlreadyRunning => {
            printer.abort();
            eprintln!("A check is already running");
            return Ok(EXIT_DECLINED);
        }
        StartOutcome::Finished { outcome, stats } => (outcome, stats),
    };
    printer.await.context("event printer failed")?;

    match outcome {
        RunOutcome::Failed(_) => Ok(EXIT_ERROR),
        RunOutcome::Completed | RunOutcome::Stopped if stats.dead > 0 => Ok(EXIT_DEAD_FOUND),
        RunOutcome::Completed | RunOutcome::Stopped => Ok(EXIT_OK),
    }
}

async fn handle_restore(
    engine: &Engine,
    settings: &Settings,
    from: Option<&std::path::Path>,
    yes: bool,
) -> Result<i32> {
    if !yes {
        eprintln!(
            "⚠️  Restore replaces every bookmark in {}. Run again with --yes to go ahead.",
            settings.bookmarks_path.display()
        );
        return Ok(EXIT_DECLINED);
    }

    let outcome = match from {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read backup file {}", path.display()))?;
            let data: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("backup file {} is not valid JSON", path.display()))?;
            match engine.snapshots.restore_from_data(&data).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    return Ok(EXIT_ERROR);
                }
            }
        }
        None => engine.snapshots.restore_latest().await,
    };

    match outcome {
        RestoreOutcome::Restored(report) => {
            println!("✅ Bookmarks restored");
            println!("   🗑️  Removed: {}", report.removed);
            println!("   ➕ Created: {}", report.created);
            let failed = report.remove_failed + report.create_failed + report.skipped;
            if failed > 0 {
                println!("   ⚠️  Not restored: {}", failed);
            }
            Ok(EXIT_OK)
        }
        RestoreOutcome::NoSnapshot => {
            eprintln!("No backup stored yet. Run `bookmark-guardian backup` first.");
            Ok(EXIT_DECLINED)
        }
        RestoreOutcome::Failed(reason) => {
            eprintln!("❌ Restore failed: {}", reason);
            Ok(EXIT_ERROR)
        }
    }
}

// Prints events until the run's terminal event.
async fn print_events(mut rx: broadcast::Receiver<Event>, json: bool) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "progress output fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let terminal = event.is_terminal();

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            }
        } else {
            print_event(&event);
        }

        if terminal {
            break;
        }
    }
}

fn print_event(event: &Event) {
    match event {
        Event::BackupCreated { .. } => println!("💾 Backup created"),
        Event::CheckingStarted { stats, skipped } => {
            println!("🔍 Checking {} bookmark(s)", stats.total);
            if *skipped > 0 {
                println!("   ({} skipped: not http/https)", skipped);
            }
            println!();
        }
        Event::ProgressUpdate { progress, stats, .. } => {
            println!(
                "   [{:>3.0}%] {}/{} checked, {} dead",
                progress * 100.0,
                stats.checked,
                stats.total,
                stats.dead
            );
        }
        Event::DeadBookmarkFound { bookmark } => println!("   ❌ {} ({})", bookmark.title, bookmark.url),
        Event::BookmarkRemoved { bookmark } => println!("   🗑️  Removed {}", bookmark.title),
        Event::CheckingComplete { stats } => print_summary("✅ Check complete", stats),
        Event::CheckingStopped { stats } => print_summary("⏹️  Check stopped", stats),
        Event::CheckingError { error } => eprintln!("⚠️  Check failed: {}", error),
        Event::BackupRestored => println!("✅ Bookmarks restored"),
    }
}

fn print_summary(headline: &str, stats: &Stats) {
    println!();
    println!("{}", headline);
    println!("📊 Summary:");
    println!("   📋 Checked: {}/{}", stats.checked, stats.total);
    println!("   ❌ Dead: {}", stats.dead);
    println!("   🗑️  Removed: {}", stats.removed);
}
