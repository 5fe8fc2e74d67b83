// src/run/controller.rs
// =============================================================================
// The one place that starts and stops checking runs.
//
// State machine:
//
//   Idle --start--> Preparing --> Running --request_stop--> Stopping
//     ^                 |             |                         |
//     +-----------------+-------------+-------------------------+
//        (backup failed, or Completed, Stopped or Failed)
//
// Preparing covers the backup taken before the first run. The state lock is
// not held during it, so status() and request_stop() answer right away.
//
// - start() while a run is active is declined (AlreadyRunning), not an error
// - request_stop() while Idle does nothing
// - the first start() ever captures a backup before touching anything; if that
//   capture fails the run never begins
//
// Every run emits CHECKING_STARTED, one PROGRESS_UPDATE per batch, and exactly
// one terminal event (CHECKING_COMPLETE, CHECKING_STOPPED or CHECKING_ERROR).
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use super::events::{Event, EventBus};
use crate::bookmarks::{flatten, BookmarkEntry, BookmarkStore};
use crate::checker::{
    is_checkable_url, BatchObserver, BatchProgress, BatchScheduler, Probe, RunOutcome, Stats, StopSignal,
};
use crate::config::Settings;
use crate::snapshot::SnapshotManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Taking the backup the run depends on.
    Preparing,
    Running,
    Stopping,
}

#[derive(Debug)]
struct RunState {
    phase: Phase,
    stats: Stats,
}

/// Answer to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub running: bool,
    pub stats: Stats,
    pub snapshot_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Another run is active; nothing was done.
    AlreadyRunning,
    Finished { outcome: RunOutcome, stats: Stats },
}

pub struct RunController {
    store: Arc<dyn BookmarkStore>,
    snapshots: Arc<SnapshotManager>,
    scheduler: BatchScheduler,
    events: EventBus,
    checkable_schemes: Vec<String>,
    state: RwLock<RunState>,
    stop: StopSignal,
}

impl RunController {
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        snapshots: Arc<SnapshotManager>,
        scheduler: BatchScheduler,
        events: EventBus,
        checkable_schemes: Vec<String>,
    ) -> Self {
        RunController {
            store,
            snapshots,
            scheduler,
            events,
            checkable_schemes,
            state: RwLock::new(RunState {
                phase: Phase::Idle,
                stats: Stats::default(),
            }),
            stop: StopSignal::new(),
        }
    }

    pub fn from_settings(
        store: Arc<dyn BookmarkStore>,
        probe: Arc<dyn Probe>,
        snapshots: Arc<SnapshotManager>,
        events: EventBus,
        settings: &Settings,
    ) -> Self {
        let scheduler = BatchScheduler::from_settings(probe, store.clone(), settings);
        Self::new(store, snapshots, scheduler, events, settings.checkable_schemes.clone())
    }

    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn status(&self) -> RunStatus {
        let (phase, stats) = {
            let state = self.state.read().await;
            (state.phase, state.stats)
        };
        RunStatus {
            running: phase != Phase::Idle,
            stats,
            snapshot_exists: self.snapshots.exists().await,
        }
    }

    /// Run one check over the whole hierarchy and wait for it to end.
    pub async fn start(&self) -> StartOutcome {
        {
            let mut state = self.state.write().await;
            if state.phase != Phase::Idle {
                info!("check already running, start declined");
                return StartOutcome::AlreadyRunning;
            }
            state.phase = Phase::Preparing;
            self.stop.reset();
        }

        // Nothing destructive happens without a backup to go back to.
        if !self.snapshots.exists().await {
            info!("no backup yet, creating one before checking");
            if let Err(e) = self.snapshots.capture().await {
                let stats = {
                    let mut state = self.state.write().await;
                    state.phase = Phase::Idle;
                    state.stats
                };
                let reason = format!("backup failed, check not started: {}", e);
                error!(error = %e, "backup before check failed");
                self.events.emit(Event::CheckingError { error: reason.clone() });
                return StartOutcome::Finished {
                    outcome: RunOutcome::Failed(reason),
                    stats,
                };
            }
        }

        {
            let mut state = self.state.write().await;
            // A stop that came in while preparing stays in force.
            if state.phase == Phase::Preparing {
                state.phase = Phase::Running;
            }
            state.stats = Stats::default();
        }

        let mut stats = Stats::default();
        let outcome = self.execute(&mut stats).await;

        {
            let mut state = self.state.write().await;
            state.phase = Phase::Idle;
            state.stats = stats;
        }

        match &outcome {
            RunOutcome::Completed => {
                info!(checked = stats.checked, dead = stats.dead, removed = stats.removed, "check complete");
                self.events.emit(Event::CheckingComplete { stats });
            }
            RunOutcome::Stopped => {
                info!(checked = stats.checked, total = stats.total, "check stopped");
                self.events.emit(Event::CheckingStopped { stats });
            }
            RunOutcome::Failed(reason) => {
                error!(reason = %reason, "check failed");
                self.events.emit(Event::CheckingError { error: reason.clone() });
            }
        }
        StartOutcome::Finished { outcome, stats }
    }

    /// Ask the active run to stop after its current batch.
    /// Returns false if there was nothing to stop.
    pub async fn request_stop(&self) -> bool {
        let mut state = self.state.write().await;
        if state.phase == Phase::Idle {
            return false;
        }
        if state.phase != Phase::Stopping {
            info!("stop requested");
        }
        state.phase = Phase::Stopping;
        self.stop.request();
        true
    }

    async fn execute(&self, stats: &mut Stats) -> RunOutcome {
        let roots = match self.store.get_tree().await {
            Ok(roots) => roots,
            Err(e) => return RunOutcome::Failed(format!("cannot read bookmark tree: {}", e)),
        };

        let (entries, skipped): (Vec<BookmarkEntry>, Vec<BookmarkEntry>) =
            flatten(&roots).partition(|entry| is_checkable_url(&entry.url, &self.checkable_schemes));

        stats.total = entries.len() as u64;
        self.state.write().await.stats = *stats;
        info!(total = stats.total, skipped = skipped.len(), "checking bookmarks");
        self.events.emit(Event::CheckingStarted {
            stats: *stats,
            skipped: skipped.len() as u64,
        });

        let mut relay = Relay {
            events: &self.events,
            state: &self.state,
        };
        self.scheduler.run(&entries, stats, &self.stop, &mut relay).await
    }
}

// Forwards scheduler callbacks to the event bus and the shared stats.
struct Relay<'a> {
    events: &'a EventBus,
    state: &'a RwLock<RunState>,
}

#[async_trait]
impl BatchObserver for Relay<'_> {
    async fn on_dead(&mut self, entry: &BookmarkEntry) {
        self.events.emit(Event::DeadBookmarkFound { bookmark: entry.into() });
    }

    async fn on_removed(&mut self, entry: &BookmarkEntry) {
        self.events.emit(Event::BookmarkRemoved { bookmark: entry.into() });
    }

    async fn on_batch_done(&mut self, progress: &BatchProgress) {
        self.state.write().await.stats = progress.stats;
        self.events.emit(Event::ProgressUpdate {
            progress: progress.fraction,
            stats: progress.stats,
            processed: progress.processed,
        });
    }
}
