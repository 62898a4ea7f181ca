//! Host-wide marker inventory
//!
//! Walks every filesystem and attributes every marker to its owning job by
//! decoding names and tags; entries that do not decode belong to other
//! schemes or to operators and are skipped. The result is a point-in-time
//! snapshot that may be stale the instant it is returned.

use anyhow::{Context, Result};
use serde::Serialize;
use zfs::{VersionType, ZfsPort};

use crate::jobid::JobID;
use crate::names;

/// A step bookmark attributed to its owning job. Field names are a stable
/// serialization surface for operator tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepBookmark {
    #[serde(rename = "FS")]
    pub fs: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Guid")]
    pub guid: u64,
    #[serde(rename = "JobID")]
    pub job_id: JobID,
}

/// A step hold attributed to its owning job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepHold {
    #[serde(rename = "FS")]
    pub fs: String,
    #[serde(rename = "Snap")]
    pub snap: String,
    #[serde(rename = "JobID")]
    pub job_id: JobID,
}

/// All step markers on the host.
#[derive(Debug, Default, Serialize)]
pub struct ListStepAllOutput {
    #[serde(rename = "StepBookmarks")]
    pub step_bookmarks: Vec<StepBookmark>,
    #[serde(rename = "StepHolds")]
    pub step_holds: Vec<StepHold>,
}

/// A last-received hold attributed to its owning job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastReceivedHold {
    #[serde(rename = "FS")]
    pub fs: String,
    #[serde(rename = "Snap")]
    pub snap: String,
    #[serde(rename = "Tag")]
    pub tag: String,
    #[serde(rename = "JobID")]
    pub job_id: JobID,
}

/// Enumerates every step hold and step bookmark on the host, across all
/// filesystems and jobs.
pub async fn list_step_all(zfs: &dyn ZfsPort) -> Result<ListStepAllOutput> {
    let mut out = ListStepAllOutput::default();

    for fs in zfs.list_filesystems().await.context("list filesystems")? {
        let versions = zfs
            .list_versions(&fs, None)
            .await
            .with_context(|| format!("list filesystem versions of {fs:?}"))?;
        for v in versions {
            match v.kind {
                VersionType::Bookmark => {
                    let full_name = v.to_abs_path(&fs);
                    if let Some((guid, job_id)) = names::parse_step_bookmark_name(&full_name) {
                        out.step_bookmarks.push(StepBookmark {
                            fs: fs.to_string(),
                            name: v.name,
                            guid,
                            job_id,
                        });
                    }
                }
                VersionType::Snapshot => {
                    let holds = zfs
                        .list_holds(fs.as_str(), &v.name)
                        .await
                        .with_context(|| format!("get holds of {:?}", v.to_abs_path(&fs)))?;
                    for tag in holds {
                        if let Some(job_id) = names::parse_step_hold_tag(&tag) {
                            out.step_holds.push(StepHold {
                                fs: fs.to_string(),
                                snap: v.name.clone(),
                                job_id,
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Enumerates every last-received hold on the host, across all filesystems
/// and jobs.
pub async fn list_last_received_all(zfs: &dyn ZfsPort) -> Result<Vec<LastReceivedHold>> {
    let mut out = Vec::new();

    for fs in zfs.list_filesystems().await.context("list filesystems")? {
        let versions = zfs
            .list_versions(&fs, None)
            .await
            .with_context(|| format!("list filesystem versions of {fs:?}"))?;
        for v in versions {
            if v.kind != VersionType::Snapshot {
                continue;
            }
            let holds = zfs
                .list_holds(fs.as_str(), &v.name)
                .await
                .with_context(|| format!("get holds of {:?}", v.to_abs_path(&fs)))?;
            for tag in holds {
                let job_id = match names::parse_last_received_hold_tag(&tag) {
                    Some(job_id) => job_id,
                    None => continue, // not the tag we're looking for
                };
                out.push(LastReceivedHold {
                    fs: fs.to_string(),
                    snap: v.name.clone(),
                    tag,
                    job_id,
                });
            }
        }
    }

    Ok(out)
}
