use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::job::Job;
use crate::error::ReplayError;

/// Fingerprint of a job snapshot, compared on every conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    /// Hex SHA-256 of the job's JSON serialization.
    pub fn of(job: &Job) -> Self {
        // Job has only plain fields, so serialization never fails in practice.
        let canonical = serde_json::to_vec(job).unwrap_or_else(|_| format!("{job:?}").into_bytes());
        Self(hex::encode(Sha256::digest(&canonical)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted form used in `ETag` headers.
    pub fn to_header(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionTag {
    type Err = ReplayError;

    /// Accepts bare, quoted and weak (`W/"..."`) header forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("W/").unwrap_or(s);
        let s = s.trim_matches('"');
        if s.is_empty() {
            return Err(ReplayError::InvalidPatch("empty version tag".into()));
        }
        Ok(Self(s.to_string()))
    }
}
