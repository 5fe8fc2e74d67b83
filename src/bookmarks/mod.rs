// src/bookmarks/mod.rs
// =============================================================================
// Everything about the bookmark hierarchy itself.
//
// Submodules:
// - model: the node types (folders, bookmarks, ids)
// - store: the BookmarkStore trait plus in-memory and JSON-file stores
// - walker: flattening the tree into a list, and rebuilding it from a snapshot
// =============================================================================

mod model;
mod store;
mod walker;

pub use model::{BookmarkEntry, BookmarkNode, FolderNode, NodeId, NodeShapeError};
pub use store::{BookmarkStore, CreateRequest, JsonFileStore, MemoryStore};
pub use walker::{flatten, rebuild, Flatten, RebuildReport};
