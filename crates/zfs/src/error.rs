//! Error taxonomy for ZFS operations

use thiserror::Error;

/// Errors surfaced by the capability port and its drivers.
///
/// Callers dispatch on the variant, never on message text. Every engine
/// operation is retry-safe on any of these: the retry either succeeds or
/// observes the same error deterministically.
#[derive(Debug, Error)]
pub enum ZfsError {
    /// The referenced dataset, snapshot or bookmark does not exist.
    ///
    /// Lookups of the replication cursor treat this as "no cursor";
    /// validating operations treat it as an input error.
    #[error("dataset does not exist: {path:?}")]
    DatasetDoesNotExist { path: String },

    /// A bookmark with the requested name exists but points at a different
    /// snapshot. The caller decides whether to destroy it.
    #[error("bookmark exists but has different guid: {bookmark:?}")]
    BookmarkExists { bookmark: String },

    /// The pool cannot create a bookmark from another bookmark. Propagated
    /// unchanged so replication drivers can fall back to snapshots.
    #[error("bookmark cloning is not supported by the pool")]
    BookmarkCloningNotSupported,

    /// A name, tag or dataset path fails ZFS naming rules, or a claimed
    /// version does not match pool state.
    #[error("{0}")]
    Validation(String),

    /// A state transition the engine refuses to make, e.g. moving the
    /// replication cursor backwards. Never retried internally.
    #[error("{0}")]
    InvariantViolation(String),

    /// The zfs command failed in a way we do not classify further.
    /// Retryable at the caller's discretion.
    #[error("zfs: {0}")]
    Transport(String),

    /// Failed to spawn or talk to the zfs process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZfsError {
    /// True for the "requested version absent" kind.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, ZfsError::DatasetDoesNotExist { .. })
    }
}
