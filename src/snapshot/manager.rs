// src/snapshot/manager.rs
// =============================================================================
// Snapshots of the whole bookmark hierarchy, and restoring from them.
//
// capture():  read the live tree, stamp it with time + schema version, store
//             it (replacing the previous one), announce BACKUP_CREATED
// validate(): the gate for backup files supplied by the user; nothing
//             destructive happens before a file passes it
// restore():  destructive, in two phases
//             1. clear: remove everything under every live root, children
//                before parents; protected containers are skipped quietly
//             2. rebuild: recreate the snapshot's nodes under the matching
//                live roots, parents before children
//
// Individual nodes that can't be removed or created are logged and counted,
// the restore keeps going. Only two things abort a restore, and both are
// detected before anything is cleared: the live tree can't be read, or a
// snapshot root has no live root to go into.
// =============================================================================

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::storage::KeyValueStorage;
use crate::bookmarks::{rebuild, BookmarkNode, BookmarkStore, FolderNode, NodeId, RebuildReport};
use crate::error::{Error, Result, StorageError, StoreError, ValidationError};
use crate::run::{Event, EventBus};

/// Schema version written into every snapshot.
pub const SCHEMA_VERSION: &str = "1.0";

const SNAPSHOT_KEY: &str = "bookmarkBackup";
const TIMESTAMP_KEY: &str = "backupTimestamp";

/// A point-in-time deep copy of the whole hierarchy.
///
/// Serialized as `{"tree": [...], "timestamp": <epoch ms>, "version": "1.0"}`;
/// `roots`, `capturedAt` and `schemaVersion` are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "version", alias = "schemaVersion")]
    pub schema_version: String,

    #[serde(rename = "timestamp", alias = "capturedAt", with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,

    #[serde(rename = "tree", alias = "roots")]
    pub roots: Vec<FolderNode>,
}

impl Snapshot {
    /// Wrap `roots` in a snapshot taken now.
    pub fn new(roots: Vec<FolderNode>) -> Self {
        Snapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            captured_at: now_millis(),
            roots,
        }
    }

    /// Suggested file name for an export, e.g. `bookmark-backup-2024-05-01.json`.
    pub fn default_file_name(&self) -> String {
        format!("bookmark-backup-{}.json", self.captured_at.format("%Y-%m-%d"))
    }

    /// Number of bookmarks (leaves) in the snapshot.
    pub fn bookmark_count(&self) -> usize {
        crate::bookmarks::flatten(&self.roots).count()
    }
}

/// Counters from one restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub removed: usize,
    pub remove_failed: usize,
    pub created: usize,
    pub create_failed: usize,
    /// Nodes not created because their parent folder failed.
    pub skipped: usize,
}

impl RestoreReport {
    fn add_rebuild(&mut self, rebuild: RebuildReport) {
        self.created += rebuild.created;
        self.create_failed += rebuild.failed;
        self.skipped += rebuild.skipped;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(RestoreReport),
    /// There is no stored snapshot to restore from.
    NoSnapshot,
    Failed(String),
}

// Where each snapshot root goes.
enum RootPlan<'a> {
    // The live store has no roots: recreate the snapshot roots themselves.
    Recreate,
    Mapped(Vec<(NodeId, &'a FolderNode)>),
}

enum Removal {
    Removed,
    Protected,
    Failed,
}

/// Captures, stores and restores snapshots.
pub struct SnapshotManager {
    store: Arc<dyn BookmarkStore>,
    storage: Arc<dyn KeyValueStorage>,
    events: EventBus,
    latest: RwLock<Option<Snapshot>>,
}

impl SnapshotManager {
    pub fn new(store: Arc<dyn BookmarkStore>, storage: Arc<dyn KeyValueStorage>, events: EventBus) -> Self {
        SnapshotManager {
            store,
            storage,
            events,
            latest: RwLock::new(None),
        }
    }

    /// Pick up a snapshot persisted by an earlier process.
    pub async fn load(&self) -> Result<Option<Snapshot>> {
        let mut values = self.storage.get(&[SNAPSHOT_KEY]).await?;
        let snapshot = match values.remove(SNAPSHOT_KEY) {
            Some(value) => Some(serde_json::from_value::<Snapshot>(value).map_err(StorageError::from)?),
            None => None,
        };
        if let Some(snapshot) = &snapshot {
            info!(captured_at = %snapshot.captured_at, "existing backup loaded");
        }
        *self.latest.write().await = snapshot.clone();
        Ok(snapshot)
    }

    pub async fn exists(&self) -> bool {
        self.latest.read().await.is_some()
    }

    pub async fn latest(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Snapshot the live hierarchy and store it, replacing the previous one.
    pub async fn capture(&self) -> Result<Snapshot> {
        let roots = self.store.get_tree().await.map_err(Error::capture)?;
        let snapshot = Snapshot::new(roots);
        let timestamp = snapshot.captured_at.timestamp_millis();

        let mut entries = Map::new();
        entries.insert(
            SNAPSHOT_KEY.to_string(),
            serde_json::to_value(&snapshot).map_err(Error::capture)?,
        );
        entries.insert(TIMESTAMP_KEY.to_string(), Value::from(timestamp));
        self.storage.set(entries).await.map_err(Error::capture)?;

        *self.latest.write().await = Some(snapshot.clone());
        info!(bookmarks = snapshot.bookmark_count(), "backup created");
        self.events.emit(Event::BackupCreated { timestamp });
        Ok(snapshot)
    }

    /// Check externally supplied data and turn it into a snapshot.
    ///
    /// Requires a non-empty `tree` (or `roots`) array and a `version` (or
    /// `schemaVersion`). Every node must be a folder or a bookmark, and every
    /// top-level node must be a folder. Other fields are ignored.
    pub fn validate(candidate: &Value) -> std::result::Result<Snapshot, ValidationError> {
        let object = candidate
            .as_object()
            .ok_or_else(|| ValidationError::Malformed("expected a JSON object".to_string()))?;

        let tree = match object.get("tree").or_else(|| object.get("roots")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Err(ValidationError::MissingTree),
        };
        if tree.is_empty() {
            return Err(ValidationError::EmptyTree);
        }

        let schema_version = match object.get("version").or_else(|| object.get("schemaVersion")) {
            Some(Value::String(version)) if !version.is_empty() => version.clone(),
            Some(Value::Number(version)) => version.to_string(),
            _ => return Err(ValidationError::MissingVersion),
        };

        let tree = unwrap_browser_root(tree);
        if tree.is_empty() {
            return Err(ValidationError::EmptyTree);
        }
        check_shape(tree)?;

        let roots: Vec<FolderNode> = serde_json::from_value(Value::Array(tree.to_vec()))
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        // Files without a usable timestamp are stamped with the time they were read.
        let captured_at = object
            .get("timestamp")
            .or_else(|| object.get("capturedAt"))
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(now_millis);

        Ok(Snapshot {
            schema_version,
            captured_at,
            roots,
        })
    }

    /// Restore the stored snapshot.
    pub async fn restore_latest(&self) -> RestoreOutcome {
        let Some(snapshot) = self.latest().await else {
            return RestoreOutcome::NoSnapshot;
        };
        self.restore(&snapshot).await
    }

    /// Validate supplied data, then restore it. Nothing is touched if
    /// validation fails.
    pub async fn restore_from_data(&self, candidate: &Value) -> std::result::Result<RestoreOutcome, ValidationError> {
        let snapshot = Self::validate(candidate)?;
        Ok(self.restore(&snapshot).await)
    }

    /// Replace the live hierarchy with `snapshot`.
    pub async fn restore(&self, snapshot: &Snapshot) -> RestoreOutcome {
        info!(bookmarks = snapshot.bookmark_count(), "restoring bookmarks from backup");

        let live = match self.store.get_tree().await {
            Ok(roots) => roots,
            Err(e) => return self.fail(format!("cannot read bookmark tree: {}", e)),
        };
        let plan = match plan_roots(&live, &snapshot.roots) {
            Ok(plan) => plan,
            Err(reason) => return self.fail(reason),
        };

        let mut report = RestoreReport::default();
        for root in &live {
            self.clear_under(root, &mut report).await;
        }

        match plan {
            RootPlan::Recreate => {
                let nodes: Vec<BookmarkNode> = snapshot.roots.iter().cloned().map(BookmarkNode::from).collect();
                report.add_rebuild(rebuild(self.store.as_ref(), &nodes, None).await);
            }
            RootPlan::Mapped(pairs) => {
                for (live_id, snapshot_root) in pairs {
                    report.add_rebuild(rebuild(self.store.as_ref(), &snapshot_root.children, Some(&live_id)).await);
                }
            }
        }

        info!(
            removed = report.removed,
            created = report.created,
            failed = report.remove_failed + report.create_failed,
            "bookmarks restored"
        );
        self.events.emit(Event::BackupRestored);
        RestoreOutcome::Restored(report)
    }

    /// Write a snapshot to a file the user can keep.
    pub async fn export(snapshot: &Snapshot, path: &Path) -> std::result::Result<(), StorageError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    fn fail(&self, reason: String) -> RestoreOutcome {
        warn!(reason = %reason, "restore aborted");
        RestoreOutcome::Failed(reason)
    }

    // Post-order removal of everything below `root`. A folder is removed once
    // all of its children are gone; the root itself stays.
    async fn clear_under(&self, root: &FolderNode, report: &mut RestoreReport) {
        struct Frame<'a> {
            folder: &'a FolderNode,
            next: usize,
            // some child could not be removed
            blocked: bool,
        }

        let mut frames = vec![Frame {
            folder: root,
            next: 0,
            blocked: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let folder = frame.folder;
            if let Some(child) = folder.children.get(frame.next) {
                frame.next += 1;
                match child {
                    BookmarkNode::Bookmark(entry) => {
                        if !self.remove_node(entry.id.as_ref(), report).await {
                            frame.blocked = true;
                        }
                    }
                    BookmarkNode::Folder(sub) => frames.push(Frame {
                        folder: sub,
                        next: 0,
                        blocked: false,
                    }),
                }
                continue;
            }

            let Some(done) = frames.pop() else { break };
            let Some(parent) = frames.last_mut() else { break };
            if done.blocked || !self.remove_node(done.folder.id.as_ref(), report).await {
                parent.blocked = true;
            }
        }
    }

    // true if the node is gone afterwards
    async fn remove_node(&self, id: Option<&NodeId>, report: &mut RestoreReport) -> bool {
        let Some(id) = id else {
            report.remove_failed += 1;
            return false;
        };
        let removal = if self.store.is_protected(id) {
            Removal::Protected
        } else {
            match self.store.remove(id).await {
                Ok(()) => Removal::Removed,
                Err(StoreError::Protected(_)) => Removal::Protected,
                Err(e) => {
                    warn!(id = %id, error = %e, "failed to remove bookmark node");
                    Removal::Failed
                }
            }
        };
        match removal {
            Removal::Removed => {
                report.removed += 1;
                true
            }
            Removal::Protected => false,
            Removal::Failed => {
                report.remove_failed += 1;
                false
            }
        }
    }
}

// Stored timestamps are epoch milliseconds; keep no more than that in memory.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

// Match each snapshot root to a live root, by id first, then by title.
fn plan_roots<'a>(live: &[FolderNode], wanted: &'a [FolderNode]) -> std::result::Result<RootPlan<'a>, String> {
    if live.is_empty() {
        return Ok(RootPlan::Recreate);
    }
    let mut pairs = Vec::with_capacity(wanted.len());
    for root in wanted {
        let matched = live
            .iter()
            .find(|candidate| root.id.is_some() && candidate.id == root.id)
            .or_else(|| live.iter().find(|candidate| candidate.title == root.title));
        match matched.and_then(|candidate| candidate.id.clone()) {
            Some(id) => pairs.push((id, root)),
            None => return Err(format!("no live root for backup root '{}'", root.title)),
        }
    }
    Ok(RootPlan::Mapped(pairs))
}

// Browser exports wrap everything in one invisible root (id "0", no title).
fn unwrap_browser_root(tree: &[Value]) -> &[Value] {
    if let [only] = tree {
        let is_browser_root = only.get("id").and_then(Value::as_str) == Some("0")
            && only.get("title").and_then(Value::as_str).unwrap_or("").is_empty();
        if is_browser_root {
            if let Some(children) = only.get("children").and_then(Value::as_array) {
                return children.as_slice();
            }
        }
    }
    tree
}

// Walk the raw JSON so errors can name the offending node.
fn check_shape(tree: &[Value]) -> std::result::Result<(), ValidationError> {
    let mut stack: Vec<(&Value, String, bool)> = tree
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| (node, format!("tree[{}]", i), true))
        .collect();

    while let Some((node, path, top_level)) = stack.pop() {
        let invalid = |reason: &str| ValidationError::InvalidNode {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let object = node.as_object().ok_or_else(|| invalid("not an object"))?;
        if let Some(title) = object.get("title") {
            if !title.is_string() {
                return Err(invalid("title is not a string"));
            }
        }
        let url = object.get("url").filter(|url| !url.is_null());
        let children = object.get("children").filter(|children| !children.is_null());

        match (url, children) {
            (Some(_), Some(_)) => return Err(invalid("has both a url and children")),
            (None, None) => return Err(invalid("has neither a url nor children")),
            (Some(_), None) if top_level => return Err(invalid("top-level node must be a folder")),
            (Some(url), None) => {
                if !url.is_string() {
                    return Err(invalid("url is not a string"));
                }
            }
            (None, Some(children)) => {
                let children = children.as_array().ok_or_else(|| invalid("children is not an array"))?;
                stack.extend(
                    children
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(i, child)| (child, format!("{}.children[{}]", path, i), false)),
                );
            }
        }
    }
    Ok(())
}
