// src/snapshot/mod.rs
// =============================================================================
// Backup and restore of the bookmark hierarchy.
//
// Submodules:
// - storage: where the latest snapshot is persisted (memory or a JSON file)
// - manager: capture, validate, restore and export
// =============================================================================

mod manager;
mod storage;

pub use manager::{RestoreOutcome, RestoreReport, Snapshot, SnapshotManager, SCHEMA_VERSION};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
