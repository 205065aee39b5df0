//! Job identifiers.
//!
//! Jobs are keyed by a ULID (Universally Unique Lexicographically Sortable
//! Identifier). Ids generated later sort after ids generated earlier, which
//! keeps the registry listing in submission order without a separate counter.
//!
//! The text form carries a `job-` prefix (`job-01HV...`). Parsing accepts the
//! prefixed and the bare ULID form so ids copied out of logs still resolve.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

const PREFIX: &str = "job-";

/// Identifier of a Job (submit/status/stream/download unit).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct JobId {
    ulid: Ulid,
}

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self { ulid }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.ulid)
    }
}

/// Returned when a string is not a job id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job id: {0}")]
pub struct ParseJobIdError(String);

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseJobIdError(s.to_string()))
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for JobId {
    type Error = ParseJobIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
