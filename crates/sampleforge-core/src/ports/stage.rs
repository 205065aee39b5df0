//! StageAdapter port - uniform contract for external processing stages.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactRef, StageError};

/// One external capability: `run(input) -> output`.
///
/// Implementations may block for minutes (downloads, model inference). They
/// must move that work off the async executor themselves, e.g. with
/// `tokio::task::spawn_blocking`.
#[async_trait]
pub trait StageAdapter<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I) -> Result<O, StageError>;
}

/// Fetch audio from `source` into `raw_dir`. Returns the audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireInput {
    pub source: String,
    pub raw_dir: PathBuf,
}

/// Split `audio` into stems under `stems_root`. Returns the stem folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparateInput {
    pub audio: PathBuf,
    pub stems_root: PathBuf,
}

/// Estimate key and tempo of `audio`, writing the result to `meta_out`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeInput {
    pub audio: PathBuf,
    pub meta_out: PathBuf,
}

/// Sort the audio files of `source_dir` into a kit layout under `out_dir`.
/// Returns the organised folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyInput {
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
}

/// Copy every entry of `include` into `staging_dir`, then archive
/// `staging_dir` as `archive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInput {
    pub staging_dir: PathBuf,
    pub include: Vec<PackageEntry>,
    pub archive: PathBuf,
}

/// A file or directory copied into the package under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub from: PathBuf,
    pub name: String,
}

impl PackageEntry {
    pub fn new(from: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            name: name.into(),
        }
    }
}

/// Key/tempo estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub key: Option<String>,
    pub bpm: Option<f64>,
}

impl AudioAnalysis {
    /// `Key=C, BPM≈120.0`; unknown values render as `—`. A tempo of 0 is
    /// unknown too.
    pub fn summary(&self) -> String {
        let key = self.key.as_deref().unwrap_or("—");
        let bpm = self
            .bpm
            .filter(|b| *b != 0.0)
            .map(|b| format!("{:.1}", b))
            .unwrap_or_else(|| "—".to_string());
        format!("Key={key}, BPM≈{bpm}")
    }
}

/// The five adapters a pipeline can drive.
#[derive(Clone)]
pub struct StageSet {
    pub acquire: Arc<dyn StageAdapter<AcquireInput, PathBuf>>,
    pub separate: Arc<dyn StageAdapter<SeparateInput, PathBuf>>,
    pub analyze: Arc<dyn StageAdapter<AnalyzeInput, AudioAnalysis>>,
    pub classify: Arc<dyn StageAdapter<ClassifyInput, PathBuf>>,
    pub package: Arc<dyn StageAdapter<PackageInput, ArtifactRef>>,
}
