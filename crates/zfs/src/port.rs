//! The capability port: every way the core touches a pool

use async_trait::async_trait;

use crate::dataset::DatasetPath;
use crate::error::ZfsError;
use crate::version::{FilesystemVersion, VersionRef, VersionType};

/// Pool-reported identity properties of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTxgAndGuid {
    pub create_txg: u64,
    pub guid: u64,
}

/// Accept/reject callback for version listings.
pub type VersionFilter = dyn Fn(VersionType, &str) -> bool + Send + Sync;

/// Abstract interface to the ZFS store.
///
/// Every call is a suspension point and may fail with [`ZfsError`]; no
/// state is cached between calls, so operator intervention on the pool is
/// always observable. Implementations must be safe to share across
/// concurrently running jobs.
#[async_trait]
pub trait ZfsPort: Send + Sync {
    /// All filesystems and volumes on the host.
    async fn list_filesystems(&self) -> Result<Vec<DatasetPath>, ZfsError>;

    /// Snapshots and bookmarks of `fs`, sorted ascending by create_txg.
    ///
    /// A nonexistent filesystem yields an empty list, mirroring the
    /// behavior of listing a dataset that was destroyed mid-walk.
    async fn list_versions(
        &self,
        fs: &DatasetPath,
        filter: Option<&VersionFilter>,
    ) -> Result<Vec<FilesystemVersion>, ZfsError>;

    /// `{create_txg, guid}` of the version at `full_path`, or
    /// [`ZfsError::DatasetDoesNotExist`].
    async fn get_create_txg_and_guid(&self, full_path: &str)
        -> Result<CreateTxgAndGuid, ZfsError>;

    /// GUID of `fs` + `rel_name` (leading `@`/`#` included in `rel_name`).
    async fn get_guid(&self, fs: &str, rel_name: &str) -> Result<u64, ZfsError>;

    /// Acquires the user hold `tag` on the snapshot `v`. Re-holding with
    /// the same tag is a no-op.
    async fn hold(&self, fs: &str, v: &VersionRef, tag: &str) -> Result<(), ZfsError>;

    /// Releases the user hold `tag` from the snapshot at `full_path`.
    /// Releasing a tag that is not held is a no-op.
    async fn release(&self, tag: &str, full_path: &str) -> Result<(), ZfsError>;

    /// Creates the bookmark `fs#bookmark_name` from `source`.
    ///
    /// Contract:
    /// - no such bookmark: create it, success
    /// - bookmark exists with the same GUID as `source`: success (no-op)
    /// - bookmark exists with a different GUID: [`ZfsError::BookmarkExists`]
    /// - `source` destroyed: [`ZfsError::DatasetDoesNotExist`]
    /// - `source` is a bookmark and the pool cannot clone bookmarks:
    ///   [`ZfsError::BookmarkCloningNotSupported`]
    async fn bookmark(
        &self,
        fs: &str,
        source: &VersionRef,
        bookmark_name: &str,
    ) -> Result<(), ZfsError>;

    /// Destroys the snapshot or bookmark at `full_path`. A held snapshot
    /// cannot be destroyed.
    async fn destroy(&self, full_path: &str) -> Result<(), ZfsError>;

    /// Like [`ZfsPort::destroy`], but "does not exist" counts as success.
    async fn destroy_idempotent(&self, full_path: &str) -> Result<(), ZfsError> {
        match self.destroy(full_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_does_not_exist() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// User hold tags on the snapshot `snap_name` of `fs`.
    async fn list_holds(&self, fs: &str, snap_name: &str) -> Result<Vec<String>, ZfsError>;

    /// Releases `tag` from every snapshot of `fs` whose create_txg is less
    /// than or equal to that of the version carrying `guid`.
    ///
    /// Fails with `Validation` if no version of `fs` carries `guid`.
    async fn release_all_older_and_including_guid(
        &self,
        fs: &str,
        guid: u64,
        tag: &str,
    ) -> Result<(), ZfsError> {
        self.release_all_cutoff_by_guid(fs, guid, tag, true).await
    }

    /// Like [`ZfsPort::release_all_older_and_including_guid`], but strictly
    /// less than, so a hold on the referenced snapshot itself survives.
    async fn release_all_older_than_guid(
        &self,
        fs: &str,
        guid: u64,
        tag: &str,
    ) -> Result<(), ZfsError> {
        self.release_all_cutoff_by_guid(fs, guid, tag, false).await
    }

    /// Shared implementation of the two batch releases. Implementations
    /// with a native batch primitive may override; the invariants of the
    /// two public variants must hold either way.
    async fn release_all_cutoff_by_guid(
        &self,
        fs: &str,
        guid: u64,
        tag: &str,
        inclusive: bool,
    ) -> Result<(), ZfsError> {
        let ds = DatasetPath::new(fs)?;
        let versions = self.list_versions(&ds, None).await?;
        // The cutoff may be named by a bookmark whose snapshot is already
        // gone; any version kind determines it.
        let cutoff = versions
            .iter()
            .find(|v| v.guid == guid)
            .map(|v| v.create_txg)
            .ok_or_else(|| {
                ZfsError::Validation(format!("cannot find version with guid {guid} on {fs:?}"))
            })?;
        for v in versions.iter().filter(|v| {
            v.kind == VersionType::Snapshot
                && (v.create_txg < cutoff || (inclusive && v.create_txg == cutoff))
        }) {
            let holds = self.list_holds(fs, &v.name).await?;
            if holds.iter().any(|t| t == tag) {
                self.release(tag, &v.to_abs_path(&ds)).await?;
            }
        }
        Ok(())
    }
}
