// Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use bookmark_guardian::bookmarks::{BookmarkNode, FolderNode, MemoryStore};
use bookmark_guardian::checker::{BatchScheduler, Probe, ProbeResult};
use bookmark_guardian::config::RemovalMode;
use bookmark_guardian::run::{EventBus, RunController};
use bookmark_guardian::snapshot::{MemoryStorage, SnapshotManager};

/// A probe with a fixed list of dead URLs. Optionally holds every probe
/// until the test opens the gate.
pub struct ScriptedProbe {
    dead: HashSet<String>,
    calls: Mutex<Vec<String>>,
    probed: Option<mpsc::UnboundedSender<String>>,
    gate: Option<watch::Receiver<bool>>,
}

/// The test's side of a gated probe.
pub struct Gate {
    pub probed: mpsc::UnboundedReceiver<String>,
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn open(&self) {
        let _ = self.open.send(true);
    }
}

impl ScriptedProbe {
    pub fn new(dead: &[&str]) -> Self {
        ScriptedProbe {
            dead: dead.iter().map(|url| url.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
            probed: None,
            gate: None,
        }
    }

    pub fn gated(dead: &[&str]) -> (Self, Gate) {
        let (probed_tx, probed_rx) = mpsc::unbounded_channel();
        let (open_tx, open_rx) = watch::channel(false);
        let probe = ScriptedProbe {
            probed: Some(probed_tx),
            gate: Some(open_rx),
            ..Self::new(dead)
        };
        (
            probe,
            Gate {
                probed: probed_rx,
                open: open_tx,
            },
        )
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(probed) = &self.probed {
            let _ = probed.send(url.to_string());
        }
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }
        if self.dead.contains(url) {
            ProbeResult::Dead
        } else {
            ProbeResult::Alive
        }
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub snapshots: Arc<SnapshotManager>,
    pub controller: Arc<RunController>,
    pub events: EventBus,
}

pub fn harness(store: MemoryStore, probe: Arc<ScriptedProbe>, batch_size: usize) -> Harness {
    let store = Arc::new(store);
    let storage = Arc::new(MemoryStorage::new());
    let events = EventBus::default();
    let snapshots = Arc::new(SnapshotManager::new(store.clone(), storage.clone(), events.clone()));
    let scheduler = BatchScheduler::new(probe, store.clone(), batch_size, Duration::from_secs(3), RemovalMode::Remove);
    let controller = Arc::new(RunController::new(
        store.clone(),
        snapshots.clone(),
        scheduler,
        events.clone(),
        vec!["http".to_string(), "https".to_string()],
    ));
    Harness {
        store,
        storage,
        snapshots,
        controller,
        events,
    }
}

/// One top-level folder holding `count` bookmarks site0..site{count-1}.
pub fn flat_store(count: usize) -> MemoryStore {
    let children = (0..count)
        .map(|i| BookmarkNode::bookmark(format!("site{}", i), format!("https://site{}.example", i)))
        .collect();
    MemoryStore::from_roots(vec![FolderNode::new("Bookmarks bar", children)], true)
}

/// The tree as indented "title" / "title <url>" lines, ids left out.
pub fn outline(roots: &[FolderNode]) -> Vec<String> {
    fn walk(nodes: &[BookmarkNode], depth: usize, out: &mut Vec<String>) {
        for node in nodes {
            match node {
                BookmarkNode::Folder(folder) => {
                    out.push(format!("{}{}/", "  ".repeat(depth), folder.title));
                    walk(&folder.children, depth + 1, out);
                }
                BookmarkNode::Bookmark(entry) => {
                    out.push(format!("{}{} <{}>", "  ".repeat(depth), entry.title, entry.url));
                }
            }
        }
    }

    let mut out = Vec::new();
    for root in roots {
        out.push(format!("{}/", root.title));
        walk(&root.children, 1, &mut out);
    }
    out
}
