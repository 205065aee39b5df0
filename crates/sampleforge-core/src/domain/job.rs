//! Job record and state machine.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;

/// Job state.
///
/// State transitions:
/// - Queued -> Running
/// - Running -> Done | Error | Canceled
///
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for a worker.
    Queued,

    /// A worker is executing the pipeline.
    Running,

    /// Every selected stage succeeded.
    Done,

    /// A stage failed (or no audio was available).
    Error,

    /// Stopped on request. Nothing drives this state yet.
    Canceled,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error | JobState::Canceled)
    }

    /// Legal transition table.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Running)
                | (
                    JobState::Running,
                    JobState::Done | JobState::Error | JobState::Canceled
                )
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Error => "error",
            JobState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to the downloadable output of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef(PathBuf);

impl ArtifactRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name offered to downloaders.
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.zip".to_string())
    }
}

/// One pipeline execution.
///
/// Owned exclusively by the `TaskRegistry`; everything else sees clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,

    /// 0..=100, non-decreasing while non-terminal.
    pub progress: u8,

    /// Status or error text.
    pub message: Option<String>,

    /// Set only on `Done` when packaging ran.
    pub artifact: Option<ArtifactRef>,

    /// Append-only execution log.
    pub log: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            state: JobState::Queued,
            progress: 0,
            message: None,
            artifact: None,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(JobState::Queued, JobState::Running)]
    #[case::done(JobState::Running, JobState::Done)]
    #[case::error(JobState::Running, JobState::Error)]
    #[case::canceled(JobState::Running, JobState::Canceled)]
    fn legal_transitions(#[case] from: JobState, #[case] to: JobState) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case::skip_running(JobState::Queued, JobState::Done)]
    #[case::skip_running_error(JobState::Queued, JobState::Error)]
    #[case::restart(JobState::Running, JobState::Running)]
    #[case::resurrect(JobState::Done, JobState::Running)]
    #[case::error_to_done(JobState::Error, JobState::Done)]
    #[case::back_to_queue(JobState::Canceled, JobState::Queued)]
    fn illegal_transitions(#[case] from: JobState, #[case] to: JobState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(JobState::Canceled.is_terminal());
    }

    #[test]
    fn artifact_file_name() {
        let artifact = ArtifactRef::new("/work/job-1/package.zip");
        assert_eq!(artifact.file_name(), "package.zip");
    }
}
