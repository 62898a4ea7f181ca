//! Progress marker engine
//!
//! The idempotent operations that create, advance and release the three
//! marker classes. Every operation validates its version argument against
//! the pool before acting, holds no state of its own, and is safe to retry
//! after any failure or cancellation.

use anyhow::{bail, Context, Result};
use zfs::{
    entity_namecheck, DatasetPath, FilesystemVersion, VersionRef, VersionType, ZfsError, ZfsPort,
};

use crate::jobid::JobID;
use crate::names;

/// Returns the filesystem's replication cursor bookmark, or `None` if the
/// filesystem has none. A port failure is returned as an error, so "no
/// cursor" and "could not look" stay distinguishable.
pub async fn get_replication_cursor(
    zfs: &dyn ZfsPort,
    fs: &DatasetPath,
) -> Result<Option<FilesystemVersion>> {
    let versions = zfs
        .list_versions(fs, None)
        .await
        .with_context(|| format!("list versions of {fs:?}"))?;
    Ok(versions.into_iter().find(|v| {
        v.kind == VersionType::Bookmark && v.name == names::REPLICATION_CURSOR_BOOKMARK_NAME
    }))
}

/// Moves the replication cursor bookmark of `fs` to `target`.
///
/// `target` is validated first; if validation fails the cursor is not
/// moved. The cursor only advances in create_txg order; re-setting it to
/// the version it already points at is a no-op.
///
/// The advance is destroy-then-create, so a crash in between leaves the
/// filesystem without a cursor until the caller retries.
///
/// Returns [`ZfsError::BookmarkCloningNotSupported`] unchanged if `target`
/// is a bookmark and the pool cannot bookmark bookmarks.
pub async fn set_replication_cursor(
    zfs: &dyn ZfsPort,
    fs: &str,
    target: &VersionRef,
) -> Result<()> {
    if fs.is_empty() {
        bail!("filesystem name must not be empty");
    }

    let target_props = target
        .validate_exists_and_get_props(zfs, fs)
        .await
        .with_context(|| {
            format!(
                "invalid replication cursor target {:?} (guid={})",
                target.rel_name(),
                target.guid()
            )
        })?;

    let cursor_path = format!("{fs}#{}", names::REPLICATION_CURSOR_BOOKMARK_NAME);
    let cursor = match zfs.get_create_txg_and_guid(&cursor_path).await {
        Ok(props) => Some(props),
        Err(err) if err.is_does_not_exist() => None,
        Err(err) => return Err(err).context("cannot get cursor bookmark properties"),
    };

    if let Some(cursor) = cursor {
        if target_props.create_txg < cursor.create_txg {
            return Err(ZfsError::InvariantViolation(
                "replication cursor can only be advanced, not set back".to_string(),
            )
            .into());
        }
        if cursor.guid == target_props.guid {
            return Ok(());
        }
        zfs.destroy(&cursor_path)
            .await
            .context("cannot destroy current cursor to move it to new")?;
    }

    match zfs
        .bookmark(fs, target, names::REPLICATION_CURSOR_BOOKMARK_NAME)
        .await
    {
        Err(err @ ZfsError::BookmarkCloningNotSupported) => Err(err.into()),
        res => res.context("cannot create cursor bookmark"),
    }
}

/// Idempotently attaches job `job`'s step marker to `v`: a step hold if
/// `v` is a snapshot, a step bookmark if `v` is a bookmark.
///
/// Returns [`ZfsError::BookmarkCloningNotSupported`] unchanged if `v` is a
/// bookmark and the pool cannot bookmark bookmarks.
pub async fn hold_step(zfs: &dyn ZfsPort, fs: &str, v: &VersionRef, job: &JobID) -> Result<()> {
    v.validate_exists(zfs, fs).await?;

    if v.is_snapshot() {
        let tag = names::step_hold_tag(job).context("step hold tag")?;
        zfs.hold(fs, v, &tag).await.context("step hold: zfs")?;
        return Ok(());
    }

    debug_assert!(v.is_bookmark());
    let bookmark_name = names::step_bookmark_name(fs, v.guid(), job)
        .context("create step bookmark: determine bookmark name")?;
    match zfs.bookmark(fs, v, &bookmark_name).await {
        Err(err @ ZfsError::BookmarkCloningNotSupported) => Err(err.into()),
        res => res.context("create step bookmark: zfs"),
    }
}

/// Releases job `job`'s step marker from `v`, the inverse of
/// [`hold_step`]. A step bookmark that is already gone counts as released.
pub async fn release_step(zfs: &dyn ZfsPort, fs: &str, v: &VersionRef, job: &JobID) -> Result<()> {
    v.validate_exists(zfs, fs).await?;

    if v.is_snapshot() {
        let tag = names::step_hold_tag(job).context("step release tag")?;
        zfs.release(&tag, &v.full_path(fs))
            .await
            .context("step release: zfs")?;
        return Ok(());
    }

    debug_assert!(v.is_bookmark());
    let bookmark_name = names::step_bookmark_name(fs, v.guid(), job)
        .context("step release: determine bookmark name")?;
    zfs.destroy_idempotent(&format!("{fs}#{bookmark_name}"))
        .await
        .context("step release: bookmark destroy: zfs")?;
    Ok(())
}

/// Releases all step holds and step bookmarks of job `job` on `fs` that
/// `most_recent` supersedes: holds on snapshots up to and including
/// `most_recent.create_txg`, step bookmarks strictly below it. A bookmark
/// at exactly that create_txg may be the current step's own marker and is
/// kept. Markers of other jobs and foreign names are untouched.
pub async fn release_step_all(
    zfs: &dyn ZfsPort,
    fs: &str,
    most_recent: &VersionRef,
    job: &JobID,
) -> Result<()> {
    let ds = DatasetPath::new(fs).context("step release all: invalid filesystem path")?;

    let most_recent_props = most_recent
        .validate_exists_and_get_props(zfs, fs)
        .await
        .context("step release all: validate most recent version argument")?;

    let tag = names::step_hold_tag(job).context("step release all: tag")?;

    zfs.release_all_older_and_including_guid(fs, most_recent.guid(), &tag)
        .await
        .with_context(|| {
            format!(
                "step release all: release holds older and including {:?}",
                most_recent.full_path(fs)
            )
        })?;

    let fs_owned = fs.to_owned();
    let job_owned = job.clone();
    let filter = move |kind: VersionType, name: &str| {
        kind == VersionType::Bookmark
            && names::parse_step_bookmark_name(&format!("{fs_owned}#{name}"))
                .is_some_and(|(_, parsed)| parsed == job_owned)
    };
    let step_bookmarks = zfs
        .list_versions(&ds, Some(&filter))
        .await
        .context("step release all: list step bookmarks")?;

    for v in step_bookmarks
        .iter()
        .filter(|v| v.create_txg < most_recent_props.create_txg)
    {
        tracing::debug!(bookmark = %v.to_abs_path(&ds), "destroying superseded step bookmark");
        zfs.destroy_idempotent(&v.to_abs_path(&ds))
            .await
            .context("step release all: destroy step bookmark")?;
    }

    Ok(())
}

/// Moves job `job`'s last-received hold on `fs` to the snapshot `to`.
///
/// The new hold is acquired before any older hold of this job is released,
/// so the job is never without a last-received hold; the release is
/// strictly-older-than, so a retry after a partial failure preserves the
/// hold it just acquired.
pub async fn move_last_received_hold(
    zfs: &dyn ZfsPort,
    fs: &str,
    to: &VersionRef,
    job: &JobID,
) -> Result<()> {
    to.validate_exists(zfs, fs).await?;
    entity_namecheck(&to.full_path(fs), VersionType::Snapshot)?;

    let tag = names::last_received_hold_tag(job).context("last-received-hold: hold tag")?;

    zfs.hold(fs, to, &tag)
        .await
        .context("last-received-hold: hold newly received")?;

    zfs.release_all_older_than_guid(fs, to.guid(), &tag)
        .await
        .context("last-received-hold: release older holds")?;

    Ok(())
}
