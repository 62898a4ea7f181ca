//! Marker name and hold-tag codec
//!
//! Encoders produce ZFS-legal names carrying the owning job; decoders
//! return `None` for anything that does not belong to this scheme. That
//! `None` is how mixed inventories are filtered: foreign tags and operator
//! bookmarks simply fail to decode and are skipped.
//!
//! The formats are a compatibility surface; existing installations carry
//! markers with exactly these names.

use std::sync::LazyLock;

use regex::Regex;
use zfs::{entity_namecheck, valid_hold_tag, VersionType, ZfsError};

use crate::jobid::JobID;

/// Name of the per-filesystem replication cursor bookmark.
pub const REPLICATION_CURSOR_BOOKMARK_NAME: &str = "zrepl_replication_cursor";

static STEP_HOLD_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^zrepl_STEP_J_(.+)$").unwrap());

static STEP_BOOKMARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^zrepl_STEP_G_([0-9a-f]{16})_J_(.+)$").unwrap());

static LAST_RECEIVED_HOLD_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^zrepl_last_received_J_(.+)$").unwrap());

/// Hold tag pinning the version job `job` is currently transferring.
pub fn step_hold_tag(job: &JobID) -> Result<String, ZfsError> {
    let tag = format!("zrepl_STEP_J_{job}");
    valid_hold_tag(&tag)?;
    Ok(tag)
}

/// `None` means the tag does not belong to the step-hold scheme.
pub fn parse_step_hold_tag(tag: &str) -> Option<JobID> {
    let caps = STEP_HOLD_TAG_RE.captures(tag)?;
    JobID::new(&caps[1]).ok()
}

/// Bookmark name pinning the bookmark with `guid` that job `job` is
/// currently transferring from. `guid` must be the GUID of the version the
/// bookmark will point at.
pub fn step_bookmark_name(fs: &str, guid: u64, job: &JobID) -> Result<String, ZfsError> {
    let name = format!("zrepl_STEP_G_{guid:016x}_J_{job}");
    entity_namecheck(&format!("{fs}#{name}"), VersionType::Bookmark)?;
    Ok(name)
}

/// `full_name` is the fully-qualified bookmark path including the dataset.
/// `None` means the bookmark does not belong to the step-bookmark scheme.
pub fn parse_step_bookmark_name(full_name: &str) -> Option<(u64, JobID)> {
    entity_namecheck(full_name, VersionType::Bookmark).ok()?;
    let (_, name) = full_name.split_once('#')?;
    let caps = STEP_BOOKMARK_RE.captures(name)?;
    let guid = u64::from_str_radix(&caps[1], 16).ok()?;
    let job = JobID::new(&caps[2]).ok()?;
    Some((guid, job))
}

/// Hold tag pinning the most recently received snapshot for job `job`.
pub fn last_received_hold_tag(job: &JobID) -> Result<String, ZfsError> {
    let tag = format!("zrepl_last_received_J_{job}");
    valid_hold_tag(&tag)?;
    Ok(tag)
}

/// `None` means the tag does not belong to the last-received scheme.
pub fn parse_last_received_hold_tag(tag: &str) -> Option<JobID> {
    let caps = LAST_RECEIVED_HOLD_TAG_RE.captures(tag)?;
    JobID::new(&caps[1]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(s: &str) -> JobID {
        JobID::new(s).unwrap()
    }

    #[test]
    fn test_step_hold_tag_roundtrip() {
        let tag = step_hold_tag(&job("myjob")).unwrap();
        assert_eq!(tag, "zrepl_STEP_J_myjob");
        assert_eq!(parse_step_hold_tag(&tag), Some(job("myjob")));

        assert_eq!(parse_step_hold_tag("zrepl_STEP_J_"), None);
        assert_eq!(parse_step_hold_tag("zrepl_last_received_J_myjob"), None);
        assert_eq!(parse_step_hold_tag("some_other_tag"), None);
    }

    #[test]
    fn test_step_bookmark_name_roundtrip() {
        let name = step_bookmark_name("tank/fs", 0xdeadbeef, &job("myjob")).unwrap();
        assert_eq!(name, "zrepl_STEP_G_00000000deadbeef_J_myjob");

        let parsed = parse_step_bookmark_name("tank/fs#zrepl_STEP_G_00000000deadbeef_J_myjob");
        assert_eq!(parsed, Some((0xdeadbeef, job("myjob"))));
    }

    #[test]
    fn test_step_bookmark_name_rejects_strangers() {
        assert_eq!(parse_step_bookmark_name("tank/fs#some_other_bookmark"), None);
        // empty job id field
        assert_eq!(
            parse_step_bookmark_name("tank/fs#zrepl_STEP_G_0000000000000000_J_"),
            None
        );
        // guid must be exactly 16 lowercase hex digits
        assert_eq!(
            parse_step_bookmark_name("tank/fs#zrepl_STEP_G_00000000DEADBEEF_J_myjob"),
            None
        );
        assert_eq!(
            parse_step_bookmark_name("tank/fs#zrepl_STEP_G_deadbeef_J_myjob"),
            None
        );
        // not a bookmark path at all
        assert_eq!(
            parse_step_bookmark_name("tank/fs@zrepl_STEP_G_0000000000000000_J_myjob"),
            None
        );
    }

    #[test]
    fn test_last_received_hold_tag_roundtrip() {
        let tag = last_received_hold_tag(&job("myjob")).unwrap();
        assert_eq!(tag, "zrepl_last_received_J_myjob");
        assert_eq!(parse_last_received_hold_tag(&tag), Some(job("myjob")));

        assert_eq!(parse_last_received_hold_tag("zrepl_last_received_J_"), None);
        assert_eq!(parse_last_received_hold_tag("zrepl_STEP_J_myjob"), None);
    }

    #[test]
    fn test_encoders_reject_illegal_results() {
        // a job id can be legal on its own but push the bookmark name over
        // the dataset name length limit
        let long_job = job(&"x".repeat(250));
        assert!(step_bookmark_name("tank/fs", 0, &long_job).is_err());
    }
}
