// src/lib.rs
// =============================================================================
// bookmark-guardian: finds dead bookmarks, removes them, and keeps a backup
// that the whole bookmark tree can be restored from.
//
// Modules:
// - bookmarks: the tree, the store it lives in, flatten/rebuild
// - checker: the liveness probe and the batch scheduler
// - snapshot: capture, validate, restore
// - run: the run controller and the events it broadcasts
// - config, error, logging: the usual plumbing
//
// The binary in main.rs wires these together; everything here is usable
// without it (the integration tests in tests/ do exactly that).
// =============================================================================

pub mod bookmarks;
pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
pub mod run;
pub mod snapshot;

pub use config::Settings;
pub use error::{Error, Result};
