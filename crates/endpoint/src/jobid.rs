//! Job identity

use std::fmt;

use serde::{Deserialize, Serialize};
use zfs::{component_namecheck, ZfsError};

/// Identifier of a replication job.
///
/// A constructed `JobID` is guaranteed to be usable both as a component of
/// a ZFS dataset path and inside a user hold tag; operations accepting one
/// may assume validity. Serializes as its bare string and re-validates on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobID(String);

impl JobID {
    pub fn new(s: impl Into<String>) -> Result<Self, ZfsError> {
        let s = s.into();
        if s.is_empty() {
            return Err(ZfsError::Validation("job id must not be empty".to_string()));
        }
        component_namecheck(&s).map_err(|err| {
            ZfsError::Validation(format!(
                "job id must be usable in a ZFS dataset path and hold tag: {err}"
            ))
        })?;
        Ok(JobID(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobID {
    type Error = ZfsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        JobID::new(s)
    }
}

impl From<JobID> for String {
    fn from(job: JobID) -> String {
        job.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_validation() {
        JobID::new("backup-home").unwrap();
        JobID::new("job.0:prod").unwrap();
        assert!(JobID::new("").is_err());
        assert!(JobID::new("has/slash").is_err());
        assert!(JobID::new("has\nnewline").is_err());
    }

    #[test]
    fn test_job_id_serde_roundtrip() {
        let job = JobID::new("backup-home").unwrap();
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(json, "\"backup-home\"");
        let back: JobID = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);

        // deserialization re-validates
        assert!(serde_json::from_str::<JobID>("\"\"").is_err());
        assert!(serde_json::from_str::<JobID>("\"a/b\"").is_err());
    }
}
