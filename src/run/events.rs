// src/run/events.rs
// =============================================================================
// Events the engine broadcasts while it works.
//
// Anyone can subscribe (the CLI printer, a test, a future UI). Delivery is
// fire-and-forget: if nobody is listening the event is simply dropped, and a
// slow listener that falls behind misses old events instead of blocking the
// run.
//
// On the wire each event is a JSON object with a "type" tag, e.g.
//   {"type":"PROGRESS_UPDATE","progress":0.5,"processed":3,"stats":{...}}
// =============================================================================

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::bookmarks::BookmarkEntry;
use crate::checker::Stats;

/// Title and URL of a bookmark, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkSummary {
    pub title: String,
    pub url: String,
}

impl From<&BookmarkEntry> for BookmarkSummary {
    fn from(entry: &BookmarkEntry) -> Self {
        BookmarkSummary {
            title: entry.title.clone(),
            url: entry.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// A snapshot was captured and stored.
    BackupCreated {
        /// Capture time, epoch milliseconds.
        timestamp: i64,
    },
    CheckingStarted {
        stats: Stats,
        /// Bookmarks left out because their URL can't be probed.
        skipped: u64,
    },
    ProgressUpdate {
        /// 0.0 ..= 1.0
        progress: f64,
        stats: Stats,
        processed: usize,
    },
    DeadBookmarkFound {
        bookmark: BookmarkSummary,
    },
    BookmarkRemoved {
        bookmark: BookmarkSummary,
    },
    CheckingComplete {
        stats: Stats,
    },
    CheckingStopped {
        stats: Stats,
    },
    CheckingError {
        error: String,
    },
    BackupRestored,
}

impl Event {
    /// True for the one event that ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::CheckingComplete { .. } | Event::CheckingStopped { .. } | Event::CheckingError { .. }
        )
    }
}

/// Broadcast channel for engine events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is how many events a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
