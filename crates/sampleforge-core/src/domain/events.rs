//! Events published for a job while it runs.

use serde::{Deserialize, Serialize};

use super::job::ArtifactRef;

/// One observable event of a job.
///
/// `Done` and `Failed` are terminal: nothing is published after them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEvent {
    Log { line: String },
    Progress { pct: u8 },
    Done { artifact: Option<ArtifactRef> },
    Failed { message: String },
}

impl JobEvent {
    pub fn log(line: impl Into<String>) -> Self {
        JobEvent::Log { line: line.into() }
    }

    pub fn progress(pct: u8) -> Self {
        JobEvent::Progress { pct }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done { .. } | JobEvent::Failed { .. })
    }
}
