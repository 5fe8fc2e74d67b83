// src/run/mod.rs
// =============================================================================
// Running checks and telling the world about them.
//
// Submodules:
// - events: the typed events and the broadcast bus they travel on
// - controller: the Idle/Running/Stopping state machine around one check run
// =============================================================================

mod controller;
mod events;

pub use controller::{Phase, RunController, RunStatus, StartOutcome};
pub use events::{BookmarkSummary, Event, EventBus};
