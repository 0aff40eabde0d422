//! The fixed set of scheduled jobs.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RestockError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AutoRequest,
    Reassurance,
    MissingCounts,
    DataCleanup,
}

impl JobKind {
    /// All jobs, in the order they are evaluated within a tick.
    pub const ALL: [JobKind; 4] = [
        JobKind::DataCleanup,
        JobKind::AutoRequest,
        JobKind::Reassurance,
        JobKind::MissingCounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::AutoRequest => "auto_request",
            JobKind::Reassurance => "reassurance",
            JobKind::MissingCounts => "missing_counts",
            JobKind::DataCleanup => "data_cleanup",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = RestockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto_request" | "autorequest" => Ok(JobKind::AutoRequest),
            "reassurance" => Ok(JobKind::Reassurance),
            "missing_counts" | "missingcounts" => Ok(JobKind::MissingCounts),
            "data_cleanup" | "datacleanup" | "cleanup" => Ok(JobKind::DataCleanup),
            _ => Err(RestockError::UnknownJob(s.to_string())),
        }
    }
}
