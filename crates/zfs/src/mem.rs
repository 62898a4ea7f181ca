//! In-memory pool model implementing the capability port
//!
//! A deterministic single-pool stand-in for tests and development with the
//! same observable semantics as the zfs(8) driver: idempotent bookmark
//! creation, refusal to destroy held snapshots, monotonic create_txg
//! assignment. All state lives behind one mutex that is never held across
//! an await point.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dataset::{component_namecheck, valid_hold_tag, DatasetPath};
use crate::error::ZfsError;
use crate::port::{CreateTxgAndGuid, VersionFilter, ZfsPort};
use crate::version::{decompose_version_string, FilesystemVersion, VersionRef, VersionType};

// Offsets keep GUIDs and TXGs visually distinct in test failures.
const FIRST_GUID: u64 = 1_000_000;
const FIRST_TXG: u64 = 1;

#[derive(Debug, Clone)]
struct MemVersion {
    kind: VersionType,
    name: String,
    guid: u64,
    create_txg: u64,
    creation: SystemTime,
    holds: BTreeSet<String>,
}

impl MemVersion {
    fn to_filesystem_version(&self) -> FilesystemVersion {
        FilesystemVersion {
            kind: self.kind,
            name: self.name.clone(),
            guid: self.guid,
            create_txg: self.create_txg,
            creation: self.creation,
        }
    }
}

struct Pool {
    filesystems: BTreeMap<String, Vec<MemVersion>>,
    next_guid: u64,
    next_txg: u64,
}

impl Pool {
    fn fs(&self, fs: &str) -> Result<&Vec<MemVersion>, ZfsError> {
        self.filesystems
            .get(fs)
            .ok_or_else(|| ZfsError::DatasetDoesNotExist { path: fs.to_string() })
    }

    fn fs_mut(&mut self, fs: &str) -> Result<&mut Vec<MemVersion>, ZfsError> {
        self.filesystems
            .get_mut(fs)
            .ok_or_else(|| ZfsError::DatasetDoesNotExist { path: fs.to_string() })
    }

    fn find(&self, fs: &str, kind: VersionType, name: &str) -> Result<&MemVersion, ZfsError> {
        self.fs(fs)?
            .iter()
            .find(|v| v.kind == kind && v.name == name)
            .ok_or_else(|| ZfsError::DatasetDoesNotExist {
                path: format!("{}{}{}", fs, kind.delimiter(), name),
            })
    }

    fn find_mut(
        &mut self,
        fs: &str,
        kind: VersionType,
        name: &str,
    ) -> Result<&mut MemVersion, ZfsError> {
        self.fs_mut(fs)?
            .iter_mut()
            .find(|v| v.kind == kind && v.name == name)
            .ok_or_else(|| ZfsError::DatasetDoesNotExist {
                path: format!("{}{}{}", fs, kind.delimiter(), name),
            })
    }

    fn find_by_rel(&self, fs: &str, rel_name: &str) -> Result<&MemVersion, ZfsError> {
        let kind = match rel_name.chars().next() {
            Some('@') => VersionType::Snapshot,
            Some('#') => VersionType::Bookmark,
            _ => {
                return Err(ZfsError::Validation(format!(
                    "relative version name must start with '@' or '#': {rel_name:?}"
                )))
            }
        };
        self.find(fs, kind, &rel_name[1..])
    }
}

/// In-memory [`ZfsPort`] implementation.
pub struct ZfsMem {
    pool: Mutex<Pool>,
    bookmark_cloning_supported: AtomicBool,
}

impl Default for ZfsMem {
    fn default() -> Self {
        Self::new()
    }
}

impl ZfsMem {
    pub fn new() -> Self {
        ZfsMem {
            pool: Mutex::new(Pool {
                filesystems: BTreeMap::new(),
                next_guid: FIRST_GUID,
                next_txg: FIRST_TXG,
            }),
            bookmark_cloning_supported: AtomicBool::new(true),
        }
    }

    /// Pools without the bookmark-copying feature reject bookmark-from-
    /// bookmark creation; flip this off to exercise that path.
    pub fn set_bookmark_cloning_supported(&self, supported: bool) {
        self.bookmark_cloning_supported
            .store(supported, Ordering::SeqCst);
    }

    pub fn create_filesystem(&self, fs: &str) -> Result<DatasetPath, ZfsError> {
        let ds = DatasetPath::new(fs)?;
        let mut pool = self.pool.lock();
        if pool.filesystems.contains_key(fs) {
            return Err(ZfsError::Validation(format!("filesystem {fs:?} already exists")));
        }
        pool.filesystems.insert(fs.to_string(), Vec::new());
        Ok(ds)
    }

    /// Creates a snapshot with a fresh GUID and the next create_txg and
    /// returns a reference to it.
    pub fn snapshot(&self, fs: &str, name: &str) -> Result<VersionRef, ZfsError> {
        component_namecheck(name)?;
        let mut pool = self.pool.lock();
        if pool
            .fs(fs)?
            .iter()
            .any(|v| v.kind == VersionType::Snapshot && v.name == name)
        {
            return Err(ZfsError::Validation(format!(
                "snapshot {fs}@{name} already exists"
            )));
        }
        let guid = pool.next_guid;
        pool.next_guid += 1;
        let create_txg = pool.next_txg;
        pool.next_txg += 1;
        pool.fs_mut(fs)?.push(MemVersion {
            kind: VersionType::Snapshot,
            name: name.to_string(),
            guid,
            create_txg,
            creation: SystemTime::now(),
            holds: BTreeSet::new(),
        });
        VersionRef::new(format!("@{name}"), guid)
    }

    /// Looks up a version by relative name, for test inspection.
    pub fn version(&self, fs: &str, rel_name: &str) -> Option<FilesystemVersion> {
        let pool = self.pool.lock();
        pool.find_by_rel(fs, rel_name)
            .ok()
            .map(MemVersion::to_filesystem_version)
    }

    /// Looks up a version by relative name and returns a claim-carrying
    /// reference to it.
    pub fn version_ref(&self, fs: &str, rel_name: &str) -> Option<VersionRef> {
        let v = self.version(fs, rel_name)?;
        VersionRef::new(rel_name, v.guid).ok()
    }
}

#[async_trait]
impl ZfsPort for ZfsMem {
    async fn list_filesystems(&self) -> Result<Vec<DatasetPath>, ZfsError> {
        let pool = self.pool.lock();
        pool.filesystems
            .keys()
            .map(|fs| DatasetPath::new(fs.clone()))
            .collect()
    }

    async fn list_versions(
        &self,
        fs: &DatasetPath,
        filter: Option<&VersionFilter>,
    ) -> Result<Vec<FilesystemVersion>, ZfsError> {
        let pool = self.pool.lock();
        let versions = match pool.filesystems.get(fs.as_str()) {
            Some(versions) => versions,
            None => return Ok(Vec::new()),
        };
        let mut out: Vec<FilesystemVersion> = versions
            .iter()
            .filter(|v| filter.map_or(true, |f| f(v.kind, &v.name)))
            .map(MemVersion::to_filesystem_version)
            .collect();
        out.sort_by_key(|v| v.create_txg);
        Ok(out)
    }

    async fn get_create_txg_and_guid(
        &self,
        full_path: &str,
    ) -> Result<CreateTxgAndGuid, ZfsError> {
        let (fs, kind, name) = decompose_version_string(full_path)?;
        let pool = self.pool.lock();
        let v = pool.find(&fs, kind, &name)?;
        Ok(CreateTxgAndGuid {
            create_txg: v.create_txg,
            guid: v.guid,
        })
    }

    async fn get_guid(&self, fs: &str, rel_name: &str) -> Result<u64, ZfsError> {
        let pool = self.pool.lock();
        Ok(pool.find_by_rel(fs, rel_name)?.guid)
    }

    async fn hold(&self, fs: &str, v: &VersionRef, tag: &str) -> Result<(), ZfsError> {
        valid_hold_tag(tag)?;
        let mut pool = self.pool.lock();
        let kind = v.kind();
        let version = pool.find_mut(fs, kind, v.name())?;
        if version.kind != VersionType::Snapshot {
            return Err(ZfsError::Validation(format!(
                "cannot hold {:?}: holds apply to snapshots only",
                v.full_path(fs)
            )));
        }
        version.holds.insert(tag.to_string());
        Ok(())
    }

    async fn release(&self, tag: &str, full_path: &str) -> Result<(), ZfsError> {
        let (fs, kind, name) = decompose_version_string(full_path)?;
        if kind != VersionType::Snapshot {
            return Err(ZfsError::Validation(format!(
                "cannot release {full_path:?}: holds apply to snapshots only"
            )));
        }
        let mut pool = self.pool.lock();
        let version = pool.find_mut(&fs, kind, &name)?;
        version.holds.remove(tag);
        Ok(())
    }

    async fn bookmark(
        &self,
        fs: &str,
        source: &VersionRef,
        bookmark_name: &str,
    ) -> Result<(), ZfsError> {
        component_namecheck(bookmark_name)?;
        let mut pool = self.pool.lock();
        pool.fs(fs)?;

        // ZFS resolves the source before it looks at the target name, so a
        // destroyed source wins over an existing bookmark.
        let (src_guid, src_txg, src_kind) = {
            let src = pool
                .find_by_rel(fs, source.rel_name())
                .map_err(|_| ZfsError::DatasetDoesNotExist {
                    path: source.full_path(fs),
                })?;
            (src.guid, src.create_txg, src.kind)
        };
        if src_kind == VersionType::Bookmark
            && !self.bookmark_cloning_supported.load(Ordering::SeqCst)
        {
            return Err(ZfsError::BookmarkCloningNotSupported);
        }

        if let Ok(existing) = pool.find(fs, VersionType::Bookmark, bookmark_name) {
            if existing.guid == source.guid() {
                return Ok(());
            }
            return Err(ZfsError::BookmarkExists {
                bookmark: format!("{fs}#{bookmark_name}"),
            });
        }

        pool.fs_mut(fs)?.push(MemVersion {
            kind: VersionType::Bookmark,
            name: bookmark_name.to_string(),
            guid: src_guid,
            create_txg: src_txg,
            creation: SystemTime::now(),
            holds: BTreeSet::new(),
        });
        Ok(())
    }

    async fn destroy(&self, full_path: &str) -> Result<(), ZfsError> {
        let (fs, kind, name) = decompose_version_string(full_path)?;
        let mut pool = self.pool.lock();
        let versions = pool.fs_mut(&fs).map_err(|_| ZfsError::DatasetDoesNotExist {
            path: full_path.to_string(),
        })?;
        let idx = versions
            .iter()
            .position(|v| v.kind == kind && v.name == name)
            .ok_or_else(|| ZfsError::DatasetDoesNotExist {
                path: full_path.to_string(),
            })?;
        if kind == VersionType::Snapshot && !versions[idx].holds.is_empty() {
            return Err(ZfsError::Transport(format!(
                "cannot destroy {full_path:?}: dataset is busy"
            )));
        }
        versions.remove(idx);
        Ok(())
    }

    async fn list_holds(&self, fs: &str, snap_name: &str) -> Result<Vec<String>, ZfsError> {
        let pool = self.pool.lock();
        let v = pool.find(fs, VersionType::Snapshot, snap_name)?;
        Ok(v.holds.iter().cloned().collect())
    }
}
