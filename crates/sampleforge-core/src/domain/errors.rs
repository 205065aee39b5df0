//! Error types.
//!
//! Stage failures carry a kind plus the free-text detail reported by the
//! external tool. The detail is shown to users as-is and never parsed.

use thiserror::Error;

use super::ids::JobId;
use super::job::JobState;

/// Which stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageErrorKind {
    Acquisition,
    Separation,
    Analysis,
    Classification,
    Packaging,
}

impl std::fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageErrorKind::Acquisition => "acquisition",
            StageErrorKind::Separation => "separation",
            StageErrorKind::Analysis => "analysis",
            StageErrorKind::Classification => "classification",
            StageErrorKind::Packaging => "packaging",
        };
        f.write_str(s)
    }
}

/// Failure of one stage adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct StageError {
    pub kind: StageErrorKind,
    pub detail: String,
}

impl StageError {
    pub fn new(kind: StageErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn acquisition(detail: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Acquisition, detail)
    }

    pub fn separation(detail: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Separation, detail)
    }

    pub fn analysis(detail: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Analysis, detail)
    }

    pub fn classification(detail: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Classification, detail)
    }

    pub fn packaging(detail: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Packaging, detail)
    }
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("unknown task: {0}")]
    UnknownTask(JobId),

    #[error("No audio available for analysis.")]
    NoAudioAvailable,

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("task {0} already finished")]
    AlreadyFinished(JobId),

    #[error("progress {requested} rejected (current={current}, state={state})")]
    ProgressRejected {
        requested: u8,
        current: u8,
        state: JobState,
    },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("engine is shutting down")]
    ShuttingDown,
}
