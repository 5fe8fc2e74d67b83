// src/checker/scheduler.rs
// =============================================================================
// This module walks a long list of bookmarks in small, paced batches.
//
// How it works:
// 1. Split the list into batches of B entries (default 3)
// 2. Probe every entry of a batch at the same time and wait for ALL of them
// 3. Remove the dead ones from the store (a failed removal is only logged)
// 4. Report progress
// 5. Wait D (default 3s) before the next batch, to keep the request rate low
//
// Stopping is cooperative: a stop request is looked at between batches. A
// batch that already started always finishes, but no new batch starts.
//
// Why batches instead of a big worker pool like buffer_unordered(50)?
// - A personal bookmark list hits the same few hosts over and over
// - Small paced batches stay well below any rate limiting
//
// Rust concepts:
// - futures::future::join_all: run many futures concurrently, wait for all
// - tokio::select!: wait for whichever of two futures finishes first
// - Atomics + Notify: a stop flag that can also wake a sleeping task
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::probe::{Probe, ProbeResult};
use crate::bookmarks::{BookmarkEntry, BookmarkStore};
use crate::config::{RemovalMode, Settings};

/// Counters for one run. They only go up while the run lasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub checked: u64,
    pub dead: u64,
    pub removed: u64,
}

/// How a scheduler run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
}

/// Progress after one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub stats: Stats,
    pub processed: usize,
    pub total: usize,
    /// processed / total, capped at 1.0
    pub fraction: f64,
}

impl BatchProgress {
    fn new(stats: Stats, processed: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            (processed as f64 / total as f64).min(1.0)
        };
        BatchProgress {
            stats,
            processed,
            total,
            fraction,
        }
    }
}

/// Callbacks fired while the scheduler runs.
#[async_trait]
pub trait BatchObserver: Send {
    async fn on_dead(&mut self, _entry: &BookmarkEntry) {}

    async fn on_removed(&mut self, _entry: &BookmarkEntry) {}

    async fn on_batch_done(&mut self, progress: &BatchProgress);
}

/// A stop request that is checked at batch boundaries.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current run to stop after its current batch.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clear a previous request before a new run.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking early on a stop request.
    /// Returns true if woken by a stop request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a request in between isn't lost.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = notified => true,
        }
    }
}

/// Runs probes over a bookmark list in paced batches.
pub struct BatchScheduler {
    probe: Arc<dyn Probe>,
    store: Arc<dyn BookmarkStore>,
    batch_size: usize,
    batch_delay: Duration,
    mode: RemovalMode,
}

impl BatchScheduler {
    pub fn new(
        probe: Arc<dyn Probe>,
        store: Arc<dyn BookmarkStore>,
        batch_size: usize,
        batch_delay: Duration,
        mode: RemovalMode,
    ) -> Self {
        BatchScheduler {
            probe,
            store,
            batch_size,
            batch_delay,
            mode,
        }
    }

    pub fn from_settings(probe: Arc<dyn Probe>, store: Arc<dyn BookmarkStore>, settings: &Settings) -> Self {
        Self::new(probe, store, settings.batch_size, settings.batch_delay, settings.mode)
    }

    /// Probe every entry, batch by batch, updating `stats` as it goes.
    ///
    /// `stats.total` is left alone; the caller sets it.
    pub async fn run(
        &self,
        entries: &[BookmarkEntry],
        stats: &mut Stats,
        stop: &StopSignal,
        observer: &mut dyn BatchObserver,
    ) -> RunOutcome {
        if self.batch_size == 0 {
            return RunOutcome::Failed("batch size must be at least 1".to_string());
        }

        let total = entries.len();
        let mut processed = 0;

        for batch in entries.chunks(self.batch_size) {
            if stop.is_cancelled() {
                break;
            }

            // Fan out, then wait for every probe of the batch.
            let verdicts = join_all(batch.iter().map(|entry| self.probe.probe(&entry.url))).await;

            for (entry, verdict) in batch.iter().zip(verdicts) {
                if verdict == ProbeResult::Alive {
                    debug!(title = %entry.title, url = %entry.url, "alive");
                    continue;
                }
                stats.dead += 1;
                info!(title = %entry.title, url = %entry.url, "dead link");
                observer.on_dead(entry).await;

                if self.mode == RemovalMode::Remove && self.remove(entry).await {
                    stats.removed += 1;
                    observer.on_removed(entry).await;
                }
            }

            stats.checked += batch.len() as u64;
            processed += batch.len();
            observer.on_batch_done(&BatchProgress::new(*stats, processed, total)).await;

            if processed < total && !stop.is_cancelled() {
                stop.sleep(self.batch_delay).await;
            }
        }

        if stop.is_cancelled() {
            RunOutcome::Stopped
        } else {
            RunOutcome::Completed
        }
    }

    async fn remove(&self, entry: &BookmarkEntry) -> bool {
        let Some(id) = entry.id.as_ref() else {
            warn!(title = %entry.title, "dead bookmark has no id, cannot remove it");
            return false;
        };
        match self.store.remove(id).await {
            Ok(()) => {
                info!(title = %entry.title, id = %id, "removed dead bookmark");
                true
            }
            Err(e) => {
                warn!(title = %entry.title, id = %id, error = %e, "failed to remove dead bookmark");
                false
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does entries.chunks(3) do?
//    - Splits a slice into pieces of (at most) 3 elements
//    - The last piece is shorter if the length isn't a multiple of 3
//
// 2. join_all vs buffer_unordered?
//    - join_all waits for ALL futures and keeps their order
//    - We need the order to pair each verdict with its bookmark (zip)
//
// 3. Why is stop a &StopSignal and not a bool?
//    - A bool would be copied when run() starts and never change
//    - The signal is shared, so a request from another task is seen here
//
// 4. What is `let ... else`?
//    - Pattern-match or leave: if the pattern doesn't match, the else
//      block runs and must return (or break/continue)
// -----------------------------------------------------------------------------
