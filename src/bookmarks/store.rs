// src/bookmarks/store.rs
// =============================================================================
// The bookmark store: where the live hierarchy actually lives.
//
// The engine never keeps its own copy of the live tree. Every operation that
// needs it calls get_tree() again, works on that owned copy, and sends
// remove/create requests back through this trait.
//
// Two implementations:
// - MemoryStore: the tree kept in memory (tests, and the working copy of
//   JsonFileStore)
// - JsonFileStore: a bookmarks file on disk, rewritten after each change
//
// Browser semantics we copy:
// - remove() on a folder that still has children fails
// - create() without a url makes a folder
// - top-level containers can be protected; removing one fails with
//   StoreError::Protected
// =============================================================================

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{BookmarkEntry, BookmarkNode, FolderNode, NodeId};
use crate::error::StoreError;

/// What to create. No `url` means a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub url: Option<String>,
}

/// Access to the live bookmark hierarchy.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Read the whole hierarchy as an owned copy.
    async fn get_tree(&self) -> Result<Vec<FolderNode>, StoreError>;

    /// Remove a bookmark or an empty folder.
    async fn remove(&self, id: &NodeId) -> Result<(), StoreError>;

    /// Create a node at the end of `parent_id`'s children (top level when None).
    async fn create(&self, request: CreateRequest) -> Result<BookmarkNode, StoreError>;

    /// Built-in containers that can never be removed.
    fn is_protected(&self, id: &NodeId) -> bool;
}

// -----------------------------------------------------------------------------
// MemoryStore
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Tree {
    roots: Vec<FolderNode>,
    next_id: u64,
    protected: HashSet<NodeId>,
    mutations: u64,
    // fault injection
    fail_read: bool,
    fail_remove: HashSet<NodeId>,
    fail_create: HashSet<String>,
}

impl Tree {
    fn allocate_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId::new(self.next_id.to_string())
    }

    // Gives every node an id and fixes parent links.
    fn assign_ids(&mut self) {
        let mut max_seen = self.next_id;
        let mut stack: Vec<&BookmarkNode> = Vec::new();
        for root in &self.roots {
            if let Some(n) = root.id.as_ref().and_then(|id| id.as_str().parse::<u64>().ok()) {
                max_seen = max_seen.max(n);
            }
            stack.extend(root.children.iter());
        }
        while let Some(node) = stack.pop() {
            if let Some(n) = node.id().and_then(|id| id.as_str().parse::<u64>().ok()) {
                max_seen = max_seen.max(n);
            }
            if let BookmarkNode::Folder(folder) = node {
                stack.extend(folder.children.iter());
            }
        }
        self.next_id = max_seen;

        let mut roots = std::mem::take(&mut self.roots);
        for root in &mut roots {
            if root.id.is_none() {
                root.id = Some(self.allocate_id());
            }
            let parent = root.id.clone();
            self.assign_children(&mut root.children, parent);
        }
        self.roots = roots;
    }

    fn assign_children(&mut self, children: &mut [BookmarkNode], parent: Option<NodeId>) {
        for child in children {
            match child {
                BookmarkNode::Bookmark(entry) => {
                    if entry.id.is_none() {
                        entry.id = Some(self.allocate_id());
                    }
                    entry.parent_id = parent.clone();
                }
                BookmarkNode::Folder(folder) => {
                    if folder.id.is_none() {
                        folder.id = Some(self.allocate_id());
                    }
                    let own = folder.id.clone();
                    self.assign_children(&mut folder.children, own);
                }
            }
        }
    }

    fn children_mut(&mut self, id: &NodeId) -> Option<&mut Vec<BookmarkNode>> {
        for root in self.roots.iter_mut() {
            if root.id.as_ref() == Some(id) {
                return Some(&mut root.children);
            }
            if let Some(found) = find_children_mut(&mut root.children, id) {
                return Some(found);
            }
        }
        None
    }

    fn remove(&mut self, id: &NodeId) -> Result<(), StoreError> {
        if let Some(pos) = self.roots.iter().position(|root| root.id.as_ref() == Some(id)) {
            if self.protected.contains(id) {
                return Err(StoreError::Protected(id.to_string()));
            }
            if !self.roots[pos].children.is_empty() {
                return Err(StoreError::Other(format!("folder {} is not empty", id)));
            }
            self.roots.remove(pos);
            return Ok(());
        }
        for root in self.roots.iter_mut() {
            if let Some(result) = remove_from(&mut root.children, id) {
                return result;
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    fn create(&mut self, request: CreateRequest) -> Result<BookmarkNode, StoreError> {
        let id = self.allocate_id();
        match request.parent_id {
            None => {
                if request.url.is_some() {
                    return Err(StoreError::InvalidParent("<top level>".to_string()));
                }
                let folder = FolderNode {
                    id: Some(id),
                    title: request.title,
                    children: Vec::new(),
                };
                self.roots.push(folder.clone());
                Ok(BookmarkNode::Folder(folder))
            }
            Some(parent_id) => {
                let node = match request.url {
                    Some(url) => BookmarkNode::Bookmark(BookmarkEntry {
                        id: Some(id),
                        title: request.title,
                        url,
                        parent_id: Some(parent_id.clone()),
                    }),
                    None => BookmarkNode::Folder(FolderNode {
                        id: Some(id),
                        title: request.title,
                        children: Vec::new(),
                    }),
                };
                let children = self
                    .children_mut(&parent_id)
                    .ok_or_else(|| StoreError::InvalidParent(parent_id.to_string()))?;
                children.push(node.clone());
                Ok(node)
            }
        }
    }
}

fn find_children_mut<'a>(
    nodes: &'a mut [BookmarkNode],
    id: &NodeId,
) -> Option<&'a mut Vec<BookmarkNode>> {
    for node in nodes.iter_mut() {
        if let BookmarkNode::Folder(folder) = node {
            if folder.id.as_ref() == Some(id) {
                return Some(&mut folder.children);
            }
            if let Some(found) = find_children_mut(&mut folder.children, id) {
                return Some(found);
            }
        }
    }
    None
}

// None = not in this subtree.
fn remove_from(nodes: &mut Vec<BookmarkNode>, id: &NodeId) -> Option<Result<(), StoreError>> {
    if let Some(pos) = nodes.iter().position(|node| node.id() == Some(id)) {
        if let BookmarkNode::Folder(folder) = &nodes[pos] {
            if !folder.children.is_empty() {
                return Some(Err(StoreError::Other(format!("folder {} is not empty", id))));
            }
        }
        nodes.remove(pos);
        return Some(Ok(()));
    }
    for node in nodes.iter_mut() {
        if let BookmarkNode::Folder(folder) = node {
            if let Some(result) = remove_from(&mut folder.children, id) {
                return Some(result);
            }
        }
    }
    None
}

/// In-memory bookmark store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: Mutex<Tree>,
}

impl MemoryStore {
    /// An empty store with no roots at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with one protected, empty container per title.
    pub fn with_protected_roots(titles: &[&str]) -> Self {
        let roots = titles.iter().map(|title| FolderNode::new(*title, Vec::new())).collect();
        Self::from_roots(roots, true)
    }

    /// A store seeded with an existing hierarchy. Missing ids are assigned.
    pub fn from_roots(roots: Vec<FolderNode>, protect_top_level: bool) -> Self {
        let mut tree = Tree {
            roots,
            ..Tree::default()
        };
        tree.assign_ids();
        if protect_top_level {
            tree.protected = tree.roots.iter().filter_map(|root| root.id.clone()).collect();
        }
        MemoryStore {
            tree: Mutex::new(tree),
        }
    }

    /// Current hierarchy, synchronously.
    pub fn roots(&self) -> Vec<FolderNode> {
        self.lock().roots.clone()
    }

    /// Number of successful remove/create calls so far.
    pub fn mutation_count(&self) -> u64 {
        self.lock().mutations
    }

    /// Make every get_tree() call fail.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_read = fail;
    }

    /// Make remove() of this node fail.
    pub fn fail_remove_of(&self, id: NodeId) {
        self.lock().fail_remove.insert(id);
    }

    /// Make create() of any node with this title fail.
    pub fn fail_create_titled(&self, title: &str) {
        self.lock().fail_create.insert(title.to_string());
    }

    // Whole-tree copy, so a change the caller can't keep can be undone.
    fn checkpoint(&self) -> Tree {
        self.lock().clone()
    }

    fn rollback(&self, saved: Tree) {
        *self.lock() = saved;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tree> {
        // A panic while holding the lock can't leave the tree half-edited:
        // every mutation is a single Vec push/remove.
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn get_tree(&self) -> Result<Vec<FolderNode>, StoreError> {
        let tree = self.lock();
        if tree.fail_read {
            return Err(StoreError::Other("bookmark tree is unavailable".to_string()));
        }
        Ok(tree.roots.clone())
    }

    async fn remove(&self, id: &NodeId) -> Result<(), StoreError> {
        let mut tree = self.lock();
        if tree.fail_remove.contains(id) {
            return Err(StoreError::Other(format!("removal of {} rejected", id)));
        }
        tree.remove(id)?;
        tree.mutations += 1;
        debug!(id = %id, "removed bookmark node");
        Ok(())
    }

    async fn create(&self, request: CreateRequest) -> Result<BookmarkNode, StoreError> {
        let mut tree = self.lock();
        if tree.fail_create.contains(&request.title) {
            return Err(StoreError::Other(format!("creation of '{}' rejected", request.title)));
        }
        let node = tree.create(request)?;
        tree.mutations += 1;
        Ok(node)
    }

    fn is_protected(&self, id: &NodeId) -> bool {
        self.lock().protected.contains(id)
    }
}

// -----------------------------------------------------------------------------
// JsonFileStore
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct BookmarksFile {
    roots: Vec<FolderNode>,
}

/// Bookmarks kept in a JSON file: `{"roots": [...]}`.
///
/// Top-level folders are the protected containers. The file is rewritten
/// after every successful change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Load a bookmarks file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let contents = tokio::fs::read_to_string(&path).await?;
        let file: BookmarksFile = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), roots = file.roots.len(), "loaded bookmarks file");
        Ok(JsonFileStore {
            path,
            inner: MemoryStore::from_roots(file.roots, true),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Callers hold write_lock.
    async fn persist(&self) -> Result<(), StoreError> {
        let file = BookmarksFile {
            roots: self.inner.roots(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BookmarkStore for JsonFileStore {
    async fn get_tree(&self) -> Result<Vec<FolderNode>, StoreError> {
        self.inner.get_tree().await
    }

    async fn remove(&self, id: &NodeId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let saved = self.inner.checkpoint();
        self.inner.remove(id).await?;
        if let Err(e) = self.persist().await {
            // The file still has the node, so the tree keeps it too.
            self.inner.rollback(saved);
            return Err(e);
        }
        Ok(())
    }

    async fn create(&self, request: CreateRequest) -> Result<BookmarkNode, StoreError> {
        let _guard = self.write_lock.lock().await;
        let saved = self.inner.checkpoint();
        let node = self.inner.create(request).await?;
        if let Err(e) = self.persist().await {
            self.inner.rollback(saved);
            return Err(e);
        }
        Ok(node)
    }

    fn is_protected(&self, id: &NodeId) -> bool {
        self.inner.is_protected(id)
    }
}
