//! Snapshot and bookmark identity

use std::fmt;
use std::time::SystemTime;

use crate::dataset::DatasetPath;
use crate::error::ZfsError;
use crate::port::{CreateTxgAndGuid, ZfsPort};

/// Kind of a filesystem version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionType {
    Snapshot,
    Bookmark,
}

impl VersionType {
    /// Delimiter between the dataset path and the version name.
    pub fn delimiter(&self) -> char {
        match self {
            VersionType::Snapshot => '@',
            VersionType::Bookmark => '#',
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionType::Snapshot => f.write_str("snapshot"),
            VersionType::Bookmark => f.write_str("bookmark"),
        }
    }
}

/// Splits a fully-qualified version path into `(dataset, kind, name)`.
///
/// The input must contain exactly one of `@` or `#`; the split happens at
/// the first occurrence of whichever delimiter is present.
pub fn decompose_version_string(v: &str) -> Result<(String, VersionType, String), ZfsError> {
    if v.len() < 3 {
        return Err(ZfsError::Validation(format!(
            "snapshot or bookmark name implausibly short: {v:?}"
        )));
    }

    let has_snap = v.contains('@');
    let has_bookmark = v.contains('#');
    if has_snap == has_bookmark {
        return Err(ZfsError::Validation(format!(
            "dataset cannot be snapshot and bookmark at the same time: {v:?}"
        )));
    }

    let kind = if has_snap {
        VersionType::Snapshot
    } else {
        VersionType::Bookmark
    };
    let (fs, name) = v
        .split_once(kind.delimiter())
        .expect("delimiter presence checked above");
    Ok((fs.to_string(), kind, name.to_string()))
}

/// The immutable identity of a snapshot or bookmark as reported by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemVersion {
    pub kind: VersionType,

    /// Display name, the portion after the type delimiter. Not an identity;
    /// use `guid` for identification.
    pub name: String,

    /// GUID as exported by ZFS. Uniquely identifies a snapshot across
    /// pools; a bookmark carries the GUID of its source snapshot.
    pub guid: u64,

    /// The transaction group in which the snapshot was born. A bookmark
    /// inherits the create_txg of its source snapshot.
    pub create_txg: u64,

    /// Creation time as reported by the pool.
    pub creation: SystemTime,
}

impl FilesystemVersion {
    /// Relative name including the type delimiter, e.g. `@snap` or `#bm`.
    pub fn rel_name(&self) -> String {
        format!("{}{}", self.kind.delimiter(), self.name)
    }

    /// Fully-qualified path, e.g. `tank/data@snap`.
    pub fn to_abs_path(&self, path: &DatasetPath) -> String {
        format!("{}{}{}", path, self.kind.delimiter(), self.name)
    }
}

impl fmt::Display for FilesystemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.delimiter(), self.name)
    }
}

/// A version as claimed by a replication driver: the relative name
/// (including the `@`/`#` delimiter) plus the GUID the caller believes it
/// has. The claim is checked against the pool before any marker operation
/// acts on it, so concurrent operator intervention is detected rather than
/// silently acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    rel_name: String,
    guid: u64,
}

impl VersionRef {
    /// `rel_name` must start with `@` (snapshot) or `#` (bookmark) and name
    /// a legal version.
    pub fn new(rel_name: impl Into<String>, guid: u64) -> Result<Self, ZfsError> {
        let rel_name = rel_name.into();
        match rel_name.chars().next() {
            Some('@') | Some('#') => {}
            _ => {
                return Err(ZfsError::Validation(format!(
                    "version name must start with '@' or '#': {rel_name:?}"
                )))
            }
        }
        if rel_name.len() < 2 {
            return Err(ZfsError::Validation(format!(
                "version name must not be empty: {rel_name:?}"
            )));
        }
        Ok(VersionRef { rel_name, guid })
    }

    pub fn rel_name(&self) -> &str {
        &self.rel_name
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    /// Name without the leading delimiter.
    pub fn name(&self) -> &str {
        &self.rel_name[1..]
    }

    pub fn kind(&self) -> VersionType {
        if self.is_snapshot() {
            VersionType::Snapshot
        } else {
            VersionType::Bookmark
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.rel_name.starts_with('@')
    }

    pub fn is_bookmark(&self) -> bool {
        self.rel_name.starts_with('#')
    }

    /// Fully-qualified path on `fs`.
    pub fn full_path(&self, fs: &str) -> String {
        format!("{}{}", fs, self.rel_name)
    }

    /// Fails with `Validation` if the claimed version is absent from the
    /// pool or its GUID differs from the claim.
    pub async fn validate_exists(&self, zfs: &dyn ZfsPort, fs: &str) -> Result<(), ZfsError> {
        let actual = zfs.get_guid(fs, &self.rel_name).await?;
        if actual != self.guid {
            return Err(ZfsError::Validation(format!(
                "version {:?} has guid {} on the pool, not the claimed {}",
                self.full_path(fs),
                actual,
                self.guid
            )));
        }
        Ok(())
    }

    /// Like [`VersionRef::validate_exists`], additionally returning the
    /// pool's `{create_txg, guid}` for the version.
    pub async fn validate_exists_and_get_props(
        &self,
        zfs: &dyn ZfsPort,
        fs: &str,
    ) -> Result<CreateTxgAndGuid, ZfsError> {
        let props = zfs.get_create_txg_and_guid(&self.full_path(fs)).await?;
        if props.guid != self.guid {
            return Err(ZfsError::Validation(format!(
                "version {:?} has guid {} on the pool, not the claimed {}",
                self.full_path(fs),
                props.guid,
                self.guid
            )));
        }
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_snapshot() {
        let (fs, kind, name) = decompose_version_string("tank/foo bar@a snap").unwrap();
        assert_eq!(fs, "tank/foo bar");
        assert_eq!(kind, VersionType::Snapshot);
        assert_eq!(name, "a snap");
    }

    #[test]
    fn test_decompose_bookmark() {
        let (fs, kind, name) = decompose_version_string("tank#bm").unwrap();
        assert_eq!(fs, "tank");
        assert_eq!(kind, VersionType::Bookmark);
        assert_eq!(name, "bm");
    }

    #[test]
    fn test_decompose_splits_at_first_delimiter() {
        let (fs, kind, name) = decompose_version_string("tank@a@b").unwrap();
        assert_eq!(fs, "tank");
        assert_eq!(kind, VersionType::Snapshot);
        assert_eq!(name, "a@b");
    }

    #[test]
    fn test_decompose_rejects_malformed() {
        // too short
        assert!(decompose_version_string("a@").is_err());
        // neither delimiter
        assert!(decompose_version_string("tank/foo").is_err());
        // both delimiters
        assert!(decompose_version_string("tank@snap#bm").is_err());
    }

    #[test]
    fn test_version_ref_construction() {
        let snap = VersionRef::new("@a snap", 1).unwrap();
        assert!(snap.is_snapshot());
        assert_eq!(snap.name(), "a snap");
        assert_eq!(snap.full_path("tank/foo"), "tank/foo@a snap");

        let bm = VersionRef::new("#bm", 2).unwrap();
        assert!(bm.is_bookmark());
        assert_eq!(bm.kind(), VersionType::Bookmark);

        assert!(VersionRef::new("snap", 1).is_err());
        assert!(VersionRef::new("@", 1).is_err());
    }

    #[test]
    fn test_to_abs_path() {
        let ds = DatasetPath::new("tank/foo bar").unwrap();
        let v = FilesystemVersion {
            kind: VersionType::Bookmark,
            name: "bm".to_string(),
            guid: 1,
            create_txg: 1,
            creation: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(v.to_abs_path(&ds), "tank/foo bar#bm");
        assert_eq!(v.rel_name(), "#bm");
    }
}
