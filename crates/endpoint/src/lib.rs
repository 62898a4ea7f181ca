//! Replication-progress bookkeeping
//!
//! Tracks which snapshots and bookmarks represent the last replicated state
//! between a pair of endpoints, projected onto two ZFS-native primitives:
//! user holds and bookmarks. Three marker classes:
//! - step holds / step bookmarks pin the version currently being transferred
//! - the per-filesystem replication cursor bookmark records the last fully
//!   replicated snapshot on the source
//! - last-received holds pin the most recently received snapshot on the
//!   destination
//!
//! All operations are idempotent and resolve against the pool on every
//! call, so concurrent operator intervention is observed, not cached over.

pub mod engine;
pub mod inventory;
pub mod jobid;
pub mod names;

// Re-exports
pub use engine::{
    get_replication_cursor, hold_step, move_last_received_hold, release_step, release_step_all,
    set_replication_cursor,
};
pub use inventory::{
    list_last_received_all, list_step_all, LastReceivedHold, ListStepAllOutput, StepBookmark,
    StepHold,
};
pub use jobid::JobID;
