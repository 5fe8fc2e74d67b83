// src/bookmarks/walker.rs
// =============================================================================
// Walking the bookmark tree in both directions.
//
// flatten(): tree -> list of bookmarks
//   Pre-order, depth-first: roots in order, and inside each folder the
//   children in order. Every bookmark shows up exactly once. The result is a
//   lazy iterator; calling flatten() again on the same roots restarts from
//   the beginning and yields the same order.
//
// rebuild(): snapshot nodes -> new nodes in the store
//   A folder is created before any of its children, because a child needs
//   its parent's id. If one node can't be created we log it and keep going
//   with the rest (its own children are skipped, they have nowhere to go).
//
// Both walks use an explicit stack instead of recursion, so a very deep
// bookmark tree can't overflow the call stack.
// =============================================================================

use tracing::warn;

use super::model::{BookmarkEntry, BookmarkNode, FolderNode, NodeId};
use super::store::{BookmarkStore, CreateRequest};

/// Lazy pre-order iterator over every bookmark below some roots.
pub struct Flatten<'a> {
    // Reversed so that pop() yields nodes in document order.
    stack: Vec<(&'a BookmarkNode, Option<&'a NodeId>)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = BookmarkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, parent)) = self.stack.pop() {
            match node {
                BookmarkNode::Bookmark(entry) => {
                    let mut entry = entry.clone();
                    if entry.parent_id.is_none() {
                        entry.parent_id = parent.cloned();
                    }
                    return Some(entry);
                }
                BookmarkNode::Folder(folder) => {
                    let own = folder.id.as_ref();
                    self.stack.extend(folder.children.iter().rev().map(|child| (child, own)));
                }
            }
        }
        None
    }
}

/// Every bookmark below `roots`, in stable pre-order.
pub fn flatten(roots: &[FolderNode]) -> Flatten<'_> {
    let mut stack = Vec::new();
    for root in roots.iter().rev() {
        let own = root.id.as_ref();
        stack.extend(root.children.iter().rev().map(|child| (child, own)));
    }
    Flatten { stack }
}

/// What a rebuild managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub created: usize,
    pub failed: usize,
    /// Descendants of folders that failed to be created.
    pub skipped: usize,
}

impl RebuildReport {
    pub fn merge(&mut self, other: RebuildReport) {
        self.created += other.created;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Recreate `nodes` (and everything below them) under `into_parent`.
///
/// Order and nesting are kept exactly. `into_parent = None` creates the
/// top-level nodes as new roots.
pub async fn rebuild(
    store: &dyn BookmarkStore,
    nodes: &[BookmarkNode],
    into_parent: Option<&NodeId>,
) -> RebuildReport {
    let mut report = RebuildReport::default();
    let mut stack: Vec<(&BookmarkNode, Option<NodeId>)> = nodes
        .iter()
        .rev()
        .map(|node| (node, into_parent.cloned()))
        .collect();

    while let Some((node, parent_id)) = stack.pop() {
        let request = match node {
            BookmarkNode::Bookmark(entry) => CreateRequest {
                parent_id,
                title: entry.title.clone(),
                url: Some(entry.url.clone()),
            },
            BookmarkNode::Folder(folder) => CreateRequest {
                parent_id,
                title: folder.title.clone(),
                url: None,
            },
        };

        match store.create(request).await {
            Ok(created) => {
                report.created += 1;
                if let BookmarkNode::Folder(folder) = node {
                    let new_id = created.id().cloned();
                    stack.extend(folder.children.iter().rev().map(|child| (child, new_id.clone())));
                }
            }
            Err(e) => {
                report.failed += 1;
                if let BookmarkNode::Folder(folder) = node {
                    report.skipped += folder.descendant_count();
                }
                warn!(title = node.title(), error = %e, "failed to restore bookmark node");
            }
        }
    }

    report
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why push children in reverse?
//    - A Vec used as a stack pops the LAST element first
//    - Pushing [c, b, a] means pop() gives a, then b, then c
//    - That keeps the original child order
//
// 2. What is Flatten<'a>?
//    - An iterator that borrows the tree ('a is how long the borrow lasts)
//    - Nothing is walked until you call next() (or collect())
// -----------------------------------------------------------------------------
