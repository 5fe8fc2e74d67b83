// src/bookmarks/model.rs
// =============================================================================
// The bookmark hierarchy as plain values.
//
// A hierarchy is a list of top-level folders ("roots", e.g. the toolbar and
// "Other bookmarks"). Every node below a root is either:
// - a folder: has a title and an ordered list of children, no URL
// - a bookmark: has a title and a URL, no children
//
// The JSON shape matches what browsers hand out from their bookmark APIs:
//   { "id": "5", "parentId": "1", "title": "Rust", "url": "https://..." }
//   { "id": "1", "title": "Work", "children": [ ... ] }
//
// A node with both `url` and `children` (or neither) is rejected while
// deserializing, so a FolderNode / BookmarkEntry value is always well formed.
//
// Rust concepts:
// - #[serde(try_from = ...)]: deserialize into a loose shape, then convert
//   with validation
// - Newtype pattern: NodeId wraps a String so ids and titles can't be mixed up
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque node identifier assigned by the bookmark store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

/// A leaf node: one bookmarked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct BookmarkEntry {
    /// Missing for nodes read from a hand-made backup file.
    pub id: Option<NodeId>,
    pub title: String,
    pub url: String,
    pub parent_id: Option<NodeId>,
}

/// A container node. Child order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct FolderNode {
    pub id: Option<NodeId>,
    pub title: String,
    pub children: Vec<BookmarkNode>,
}

/// Any node below a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum BookmarkNode {
    Folder(FolderNode),
    Bookmark(BookmarkEntry),
}

impl BookmarkEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkEntry {
            id: None,
            title: title.into(),
            url: url.into(),
            parent_id: None,
        }
    }
}

impl FolderNode {
    pub fn new(title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        FolderNode {
            id: None,
            title: title.into(),
            children,
        }
    }

    /// Same folder with the given id.
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Number of nodes below this folder (not counting the folder itself).
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&BookmarkNode> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            if let BookmarkNode::Folder(folder) = node {
                stack.extend(folder.children.iter());
            }
        }
        count
    }
}

impl BookmarkNode {
    /// Shorthand for a folder node.
    pub fn folder(title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        BookmarkNode::Folder(FolderNode::new(title, children))
    }

    /// Shorthand for a bookmark node.
    pub fn bookmark(title: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkNode::Bookmark(BookmarkEntry::new(title, url))
    }

    pub fn id(&self) -> Option<&NodeId> {
        match self {
            BookmarkNode::Folder(folder) => folder.id.as_ref(),
            BookmarkNode::Bookmark(entry) => entry.id.as_ref(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BookmarkNode::Folder(folder) => &folder.title,
            BookmarkNode::Bookmark(entry) => &entry.title,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, BookmarkNode::Folder(_))
    }
}

impl From<FolderNode> for BookmarkNode {
    fn from(folder: FolderNode) -> Self {
        BookmarkNode::Folder(folder)
    }
}

impl From<BookmarkEntry> for BookmarkNode {
    fn from(entry: BookmarkEntry) -> Self {
        BookmarkNode::Bookmark(entry)
    }
}

// The loose wire shape. Browsers add more fields (dateAdded, index, ...);
// serde ignores whatever we don't list here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<NodeId>,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<BookmarkNode>>,
}

/// Why a raw node couldn't become a typed node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NodeShapeError(&'static str);

const BOTH: NodeShapeError = NodeShapeError("node has both a url and children");
const NEITHER: NodeShapeError = NodeShapeError("node has neither a url nor children");

impl TryFrom<RawNode> for BookmarkNode {
    type Error = NodeShapeError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match (raw.url, raw.children) {
            (Some(_), Some(_)) => Err(BOTH),
            (None, None) => Err(NEITHER),
            (Some(url), None) => Ok(BookmarkNode::Bookmark(BookmarkEntry {
                id: raw.id,
                title: raw.title,
                url,
                parent_id: raw.parent_id,
            })),
            (None, Some(children)) => Ok(BookmarkNode::Folder(FolderNode {
                id: raw.id,
                title: raw.title,
                children,
            })),
        }
    }
}

impl TryFrom<RawNode> for FolderNode {
    type Error = NodeShapeError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match BookmarkNode::try_from(raw)? {
            BookmarkNode::Folder(folder) => Ok(folder),
            BookmarkNode::Bookmark(_) => Err(NodeShapeError("expected a folder, found a bookmark")),
        }
    }
}

impl TryFrom<RawNode> for BookmarkEntry {
    type Error = NodeShapeError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match BookmarkNode::try_from(raw)? {
            BookmarkNode::Bookmark(entry) => Ok(entry),
            BookmarkNode::Folder(_) => Err(NodeShapeError("expected a bookmark, found a folder")),
        }
    }
}

impl From<BookmarkNode> for RawNode {
    fn from(node: BookmarkNode) -> Self {
        match node {
            BookmarkNode::Folder(folder) => folder.into(),
            BookmarkNode::Bookmark(entry) => entry.into(),
        }
    }
}

impl From<FolderNode> for RawNode {
    fn from(folder: FolderNode) -> Self {
        RawNode {
            id: folder.id,
            parent_id: None,
            title: folder.title,
            url: None,
            children: Some(folder.children),
        }
    }
}

impl From<BookmarkEntry> for RawNode {
    fn from(entry: BookmarkEntry) -> Self {
        RawNode {
            id: entry.id,
            parent_id: entry.parent_id,
            title: entry.title,
            url: Some(entry.url),
            children: None,
        }
    }
}
