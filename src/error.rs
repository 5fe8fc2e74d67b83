// src/error.rs
// =============================================================================
// Error types for the library side of bookmark-guardian.
//
// The binary uses anyhow (see main.rs), but the engine returns typed errors
// so callers can tell a bad backup file apart from a broken bookmarks file.
//
// What is NOT an error here:
// - A dead link. The probe answers Alive/Dead and never fails.
// - "Already running" or "no snapshot yet". Those are ordinary outcomes and
//   live in StartOutcome / RestoreOutcome.
// =============================================================================

use std::fmt;

use thiserror::Error;

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a bookmark store for a single operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bookmark node {0} not found")]
    NotFound(String),

    /// The node is one of the store's built-in containers.
    #[error("bookmark node {0} is a protected container")]
    Protected(String),

    #[error("parent {0} does not exist or is not a folder")]
    InvalidParent(String),

    #[error("bookmark file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("bookmark file is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bookmark store error: {0}")]
    Other(String),
}

/// Failures of the key/value storage that holds the latest snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage contents are malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a supplied snapshot is rejected before any restore happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid backup data: missing or invalid tree structure")]
    MissingTree,

    #[error("invalid backup data: tree is empty")]
    EmptyTree,

    #[error("invalid backup data: missing version information")]
    MissingVersion,

    #[error("invalid backup data: node at {path}: {reason}")]
    InvalidNode { path: String, reason: String },

    #[error("invalid backup data: {0}")]
    Malformed(String),
}

/// Configuration problems, caught before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create backup: {0}")]
    Capture(String),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a new capture error.
    pub fn capture(msg: impl fmt::Display) -> Self {
        Error::Capture(msg.to_string())
    }
}

impl ConfigError {
    /// Create a new invalid-configuration error.
    pub fn invalid(msg: impl fmt::Display) -> Self {
        ConfigError::Invalid(msg.to_string())
    }
}
