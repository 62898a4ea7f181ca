//! zfs(8) subprocess driver
//!
//! Implements the capability port by shelling out to the zfs command line
//! tool and classifying its stderr into the error taxonomy. Nothing is
//! cached; every call round-trips to the pool.

use std::process::Output;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::process::Command;

use crate::dataset::DatasetPath;
use crate::error::ZfsError;
use crate::metrics;
use crate::port::{CreateTxgAndGuid, VersionFilter, ZfsPort};
use crate::version::{decompose_version_string, FilesystemVersion, VersionRef};

/// Capability port backed by the zfs(8) binary.
pub struct ZfsCli {
    binary: String,
}

impl Default for ZfsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ZfsCli {
    pub fn new() -> Self {
        ZfsCli {
            binary: "zfs".to_string(),
        }
    }

    /// Use a zfs binary other than the one found on PATH.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        ZfsCli {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, ZfsError> {
        let timer = metrics::ZFS_COMMAND_DURATION
            .with_label_values(&[args[0]])
            .start_timer();
        tracing::debug!(binary = %self.binary, ?args, "running zfs");
        let output = Command::new(&self.binary).args(args).output().await?;
        timer.observe_duration();
        if !output.status.success() {
            tracing::debug!(?args, status = %output.status, stderr = %stderr_of(&output), "zfs failed");
        }
        Ok(output)
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String, ZfsError> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(transport_error(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn transport_error(args: &[&str], output: &Output) -> ZfsError {
    ZfsError::Transport(format!(
        "zfs {} failed ({}): {}",
        args.join(" "),
        output.status,
        stderr_of(output)
    ))
}

fn is_does_not_exist(stderr: &str) -> bool {
    stderr.contains("does not exist")
}

fn parse_u64(s: &str, what: &str) -> Result<u64, ZfsError> {
    s.trim()
        .parse()
        .map_err(|err| ZfsError::Transport(format!("cannot parse {what} {s:?}: {err}")))
}

#[async_trait]
impl ZfsPort for ZfsCli {
    async fn list_filesystems(&self) -> Result<Vec<DatasetPath>, ZfsError> {
        let out = self
            .run_checked(&["list", "-H", "-p", "-o", "name", "-t", "filesystem,volume"])
            .await?;
        out.lines().map(DatasetPath::new).collect()
    }

    async fn list_versions(
        &self,
        fs: &DatasetPath,
        filter: Option<&VersionFilter>,
    ) -> Result<Vec<FilesystemVersion>, ZfsError> {
        let args = [
            "list", "-H", "-p", "-o", "name,guid,createtxg,creation", "-r", "-d", "1", "-t",
            "bookmark,snapshot", "-s", "createtxg", fs.as_str(),
        ];
        let output = self.run(&args).await?;
        if !output.status.success() {
            // The filesystem was given on the command line; treat absence
            // as an empty version list rather than an error.
            if is_does_not_exist(&stderr_of(&output)) {
                return Ok(Vec::new());
            }
            return Err(transport_error(&args, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut versions = Vec::new();
        for line in stdout.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 4 {
                return Err(ZfsError::Transport(format!(
                    "unexpected zfs list output line: {line:?}"
                )));
            }
            let (_, kind, name) = decompose_version_string(fields[0])?;
            let guid = parse_u64(fields[1], "guid")?;
            let create_txg = parse_u64(fields[2], "createtxg")?;
            let creation_unix = parse_u64(fields[3], "creation")?;
            if let Some(filter) = filter {
                if !filter(kind, &name) {
                    continue;
                }
            }
            versions.push(FilesystemVersion {
                kind,
                name,
                guid,
                create_txg,
                creation: UNIX_EPOCH + Duration::from_secs(creation_unix),
            });
        }
        Ok(versions)
    }

    async fn get_create_txg_and_guid(
        &self,
        full_path: &str,
    ) -> Result<CreateTxgAndGuid, ZfsError> {
        let args = [
            "get", "-H", "-p", "-o", "property,value", "createtxg,guid", full_path,
        ];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_does_not_exist(&stderr) {
                return Err(ZfsError::DatasetDoesNotExist {
                    path: full_path.to_string(),
                });
            }
            return Err(transport_error(&args, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut create_txg = None;
        let mut guid = None;
        for line in stdout.lines() {
            match line.split_once('\t') {
                Some(("createtxg", value)) => create_txg = Some(parse_u64(value, "createtxg")?),
                Some(("guid", value)) => guid = Some(parse_u64(value, "guid")?),
                _ => {}
            }
        }
        match (create_txg, guid) {
            (Some(create_txg), Some(guid)) => Ok(CreateTxgAndGuid { create_txg, guid }),
            _ => Err(ZfsError::Transport(format!(
                "zfs get did not report createtxg and guid for {full_path:?}"
            ))),
        }
    }

    async fn get_guid(&self, fs: &str, rel_name: &str) -> Result<u64, ZfsError> {
        let full_path = format!("{fs}{rel_name}");
        Ok(self.get_create_txg_and_guid(&full_path).await?.guid)
    }

    async fn hold(&self, fs: &str, v: &VersionRef, tag: &str) -> Result<(), ZfsError> {
        let full_path = v.full_path(fs);
        let args = ["hold", tag, full_path.as_str()];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("tag already exists") {
                return Ok(());
            }
            if is_does_not_exist(&stderr) {
                return Err(ZfsError::DatasetDoesNotExist { path: full_path });
            }
            return Err(transport_error(&args, &output));
        }
        Ok(())
    }

    async fn release(&self, tag: &str, full_path: &str) -> Result<(), ZfsError> {
        let args = ["release", tag, full_path];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("no such tag") {
                return Ok(());
            }
            if is_does_not_exist(&stderr) {
                return Err(ZfsError::DatasetDoesNotExist {
                    path: full_path.to_string(),
                });
            }
            return Err(transport_error(&args, &output));
        }
        Ok(())
    }

    async fn bookmark(
        &self,
        fs: &str,
        source: &VersionRef,
        bookmark_name: &str,
    ) -> Result<(), ZfsError> {
        let source_path = source.full_path(fs);
        let bookmark_path = format!("{fs}#{bookmark_name}");
        let args = ["bookmark", source_path.as_str(), bookmark_path.as_str()];
        let output = self.run(&args).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        if stderr.contains("bookmark exists") {
            // Same name, maybe same snapshot: compare GUIDs before giving up.
            let existing = self.get_create_txg_and_guid(&bookmark_path).await?;
            if existing.guid == source.guid() {
                return Ok(());
            }
            return Err(ZfsError::BookmarkExists {
                bookmark: bookmark_path,
            });
        }
        if source.is_bookmark() && stderr.contains("source is not a snapshot") {
            return Err(ZfsError::BookmarkCloningNotSupported);
        }
        if is_does_not_exist(&stderr) {
            return Err(ZfsError::DatasetDoesNotExist { path: source_path });
        }
        Err(transport_error(&args, &output))
    }

    async fn destroy(&self, full_path: &str) -> Result<(), ZfsError> {
        let args = ["destroy", full_path];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_does_not_exist(&stderr) {
                return Err(ZfsError::DatasetDoesNotExist {
                    path: full_path.to_string(),
                });
            }
            return Err(transport_error(&args, &output));
        }
        Ok(())
    }

    async fn list_holds(&self, fs: &str, snap_name: &str) -> Result<Vec<String>, ZfsError> {
        let full_path = format!("{fs}@{snap_name}");
        let args = ["holds", "-H", full_path.as_str()];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_does_not_exist(&stderr) {
                return Err(ZfsError::DatasetDoesNotExist { path: full_path });
            }
            return Err(transport_error(&args, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut tags = Vec::new();
        for line in stdout.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(ZfsError::Transport(format!(
                    "unexpected zfs holds output line: {line:?}"
                )));
            }
            tags.push(fields[1].to_string());
        }
        Ok(tags)
    }
}
