//! Recording stand-ins for the stage adapters.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{ArtifactRef, StageError, StageErrorKind};
use crate::ports::{
    AcquireInput, AnalyzeInput, AudioAnalysis, ClassifyInput, PackageEntry, PackageInput,
    SeparateInput, StageAdapter, StageSet,
};

/// Stand-in for all five stages. Records calls, fails on request.
#[derive(Clone, Default)]
pub struct FakeStages {
    calls: Arc<Mutex<Vec<&'static str>>>,
    packaged: Arc<Mutex<Vec<PackageEntry>>>,
    fail_at: Option<&'static str>,
}

impl FakeStages {
    pub fn failing_at(stage: &'static str) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    fn enter(&self, stage: &'static str) -> Result<(), StageError> {
        self.calls.lock().push(stage);
        match self.fail_at {
            Some(s) if s == stage => Err(StageError::new(
                match stage {
                    "acquire" => StageErrorKind::Acquisition,
                    "separate" => StageErrorKind::Separation,
                    "analyze" => StageErrorKind::Analysis,
                    "classify" => StageErrorKind::Classification,
                    _ => StageErrorKind::Packaging,
                },
                format!("{stage} exploded"),
            )),
            _ => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Entries handed to the last package call.
    pub fn packaged(&self) -> Vec<PackageEntry> {
        self.packaged.lock().clone()
    }

    pub fn set(&self) -> StageSet {
        StageSet {
            acquire: Arc::new(self.clone()),
            separate: Arc::new(self.clone()),
            analyze: Arc::new(self.clone()),
            classify: Arc::new(self.clone()),
            package: Arc::new(self.clone()),
        }
    }
}

fn write(path: &Path) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"RIFF").unwrap();
    path.to_path_buf()
}

#[async_trait]
impl StageAdapter<AcquireInput, PathBuf> for FakeStages {
    async fn run(&self, input: AcquireInput) -> Result<PathBuf, StageError> {
        self.enter("acquire")?;
        Ok(write(&input.raw_dir.join("song.wav")))
    }
}

#[async_trait]
impl StageAdapter<SeparateInput, PathBuf> for FakeStages {
    async fn run(&self, input: SeparateInput) -> Result<PathBuf, StageError> {
        self.enter("separate")?;
        let folder = input.stems_root.join("htdemucs").join("song");
        write(&folder.join("drums.wav"));
        Ok(folder)
    }
}

#[async_trait]
impl StageAdapter<AnalyzeInput, AudioAnalysis> for FakeStages {
    async fn run(&self, _input: AnalyzeInput) -> Result<AudioAnalysis, StageError> {
        self.enter("analyze")?;
        Ok(AudioAnalysis {
            key: Some("A".into()),
            bpm: Some(124.0),
        })
    }
}

#[async_trait]
impl StageAdapter<ClassifyInput, PathBuf> for FakeStages {
    async fn run(&self, input: ClassifyInput) -> Result<PathBuf, StageError> {
        self.enter("classify")?;
        Ok(input.out_dir)
    }
}

#[async_trait]
impl StageAdapter<PackageInput, ArtifactRef> for FakeStages {
    async fn run(&self, input: PackageInput) -> Result<ArtifactRef, StageError> {
        self.enter("package")?;
        *self.packaged.lock() = input.include.clone();
        Ok(ArtifactRef::new(write(&input.archive)))
    }
}

