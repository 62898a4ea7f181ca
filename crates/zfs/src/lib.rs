//! ZFS primitives for replication progress bookkeeping
//!
//! This crate provides:
//! - Snapshot/bookmark identity types and ZFS name rules
//! - The `ZfsPort` capability trait - the only surface through which the
//!   upper layers touch a pool
//! - A zfs(8) subprocess driver and an in-memory driver for tests

pub mod cli;
pub mod dataset;
pub mod error;
pub mod mem;
mod metrics;
pub mod port;
pub mod version;

// Re-exports
pub use cli::ZfsCli;
pub use dataset::{
    component_namecheck, dataset_namecheck, entity_namecheck, valid_hold_tag, DatasetPath,
};
pub use error::ZfsError;
pub use mem::ZfsMem;
pub use port::{CreateTxgAndGuid, VersionFilter, ZfsPort};
pub use version::{decompose_version_string, FilesystemVersion, VersionRef, VersionType};

/// Result type for ZFS operations
pub type Result<T> = std::result::Result<T, ZfsError>;
