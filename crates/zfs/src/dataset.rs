//! Dataset paths and ZFS name rules

use std::fmt;

use crate::error::ZfsError;
use crate::version::VersionType;

/// ZFS rejects any name longer than this, including delimiters.
const MAX_DATASET_NAME_LEN: usize = 256;

fn valid_name_char(c: char) -> bool {
    // The ZFS-legal character set for dataset components, snapshot names,
    // bookmark names and hold tags.
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | ' ')
}

/// Checks a single path component, snapshot name or bookmark name.
pub fn component_namecheck(component: &str) -> Result<(), ZfsError> {
    if component.is_empty() {
        return Err(ZfsError::Validation("name component must not be empty".to_string()));
    }
    if component == "." || component == ".." {
        return Err(ZfsError::Validation(format!(
            "name component must not be {component:?}"
        )));
    }
    if let Some(c) = component.chars().find(|&c| !valid_name_char(c)) {
        return Err(ZfsError::Validation(format!(
            "invalid character {c:?} in name component {component:?}"
        )));
    }
    Ok(())
}

/// Checks a dataset (filesystem or volume) path.
///
/// Rejects empty paths, leading/trailing/consecutive slashes, illegal
/// characters and snapshot/bookmark delimiters.
pub fn dataset_namecheck(path: &str) -> Result<(), ZfsError> {
    if path.is_empty() {
        return Err(ZfsError::Validation("dataset path must not be empty".to_string()));
    }
    if path.len() >= MAX_DATASET_NAME_LEN {
        return Err(ZfsError::Validation(format!(
            "dataset path longer than {MAX_DATASET_NAME_LEN} characters: {path:?}"
        )));
    }
    if path.contains('@') || path.contains('#') {
        return Err(ZfsError::Validation(format!(
            "dataset path must not contain '@' or '#': {path:?}"
        )));
    }
    for component in path.split('/') {
        // An empty component covers leading, trailing and consecutive slashes.
        component_namecheck(component)?;
    }
    Ok(())
}

/// Checks a fully-qualified snapshot or bookmark path, e.g.
/// `tank/data@snap` or `tank/data#bookmark`.
///
/// The path must contain exactly one occurrence of the delimiter belonging
/// to `kind` and none of the other delimiter.
pub fn entity_namecheck(path: &str, kind: VersionType) -> Result<(), ZfsError> {
    if path.len() >= MAX_DATASET_NAME_LEN {
        return Err(ZfsError::Validation(format!(
            "name longer than {MAX_DATASET_NAME_LEN} characters: {path:?}"
        )));
    }
    let delim = kind.delimiter();
    let mut split = path.splitn(2, delim);
    let dataset = split.next().unwrap_or("");
    let name = match split.next() {
        Some(name) => name,
        None => {
            return Err(ZfsError::Validation(format!(
                "{kind} name must contain {delim:?}: {path:?}"
            )))
        }
    };
    if name.contains(delim) {
        return Err(ZfsError::Validation(format!(
            "{kind} name must contain {delim:?} exactly once: {path:?}"
        )));
    }
    dataset_namecheck(dataset)?;
    component_namecheck(name)?;
    Ok(())
}

/// Checks a user hold tag.
pub fn valid_hold_tag(tag: &str) -> Result<(), ZfsError> {
    if tag.len() >= MAX_DATASET_NAME_LEN {
        return Err(ZfsError::Validation(format!(
            "hold tag longer than {MAX_DATASET_NAME_LEN} characters: {tag:?}"
        )));
    }
    component_namecheck(tag)
}

/// A validated ZFS dataset path.
///
/// Construction rejects illegal names; holders of a `DatasetPath` may
/// assume it is well-formed. The string form is recoverable via
/// [`DatasetPath::as_str`] or `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetPath(String);

impl DatasetPath {
    pub fn new(path: impl Into<String>) -> Result<Self, ZfsError> {
        let path = path.into();
        dataset_namecheck(&path)?;
        Ok(DatasetPath(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_namecheck_accepts_legal_paths() {
        for path in ["tank", "tank/foo bar", "tank/a-b_c.d:e", "p0/l1/l2/l3"] {
            dataset_namecheck(path).unwrap();
        }
    }

    #[test]
    fn test_dataset_namecheck_rejects_illegal_paths() {
        for path in [
            "",
            "/tank",
            "tank/",
            "tank//foo",
            "tank/foo@snap",
            "tank/foo#bm",
            "tank/f*o",
            "tank/..",
        ] {
            assert!(dataset_namecheck(path).is_err(), "accepted {path:?}");
        }
    }

    #[test]
    fn test_entity_namecheck() {
        entity_namecheck("tank/foo bar@a snap", VersionType::Snapshot).unwrap();
        entity_namecheck("tank/foo bar#a bookmark", VersionType::Bookmark).unwrap();

        // wrong or missing delimiter
        assert!(entity_namecheck("tank/foo@snap", VersionType::Bookmark).is_err());
        assert!(entity_namecheck("tank/foo#bm", VersionType::Snapshot).is_err());
        assert!(entity_namecheck("tank/foo", VersionType::Snapshot).is_err());

        // delimiter more than once, or both delimiters
        assert!(entity_namecheck("tank/foo@a@b", VersionType::Snapshot).is_err());
        assert!(entity_namecheck("tank/foo#a@b", VersionType::Bookmark).is_err());
        assert!(entity_namecheck("tank@foo#bm", VersionType::Bookmark).is_err());

        // empty name
        assert!(entity_namecheck("tank/foo@", VersionType::Snapshot).is_err());
    }

    #[test]
    fn test_valid_hold_tag() {
        valid_hold_tag("zrepl_STEP_J_myjob").unwrap();
        valid_hold_tag("zrepl_last_received_J_my-job.1").unwrap();
        assert!(valid_hold_tag("").is_err());
        assert!(valid_hold_tag("has/slash").is_err());
        assert!(valid_hold_tag("has\ttab").is_err());
    }

    #[test]
    fn test_dataset_path_roundtrip() {
        let ds = DatasetPath::new("tank/foo bar").unwrap();
        assert_eq!(ds.as_str(), "tank/foo bar");
        assert_eq!(ds.to_string(), "tank/foo bar");
        assert!(DatasetPath::new("tank//foo").is_err());
    }
}
