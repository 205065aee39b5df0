//! Stem separation through the demucs CLI.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::process::{blocking, run_tool};
use super::workspace::has_extension;
use crate::domain::{StageError, StageErrorKind};
use crate::ports::{SeparateInput, StageAdapter};

const KIND: StageErrorKind = StageErrorKind::Separation;

pub struct DemucsSeparator {
    demucs: OsString,
}

impl DemucsSeparator {
    pub fn new(demucs: impl Into<OsString>) -> Self {
        Self {
            demucs: demucs.into(),
        }
    }
}

#[async_trait]
impl StageAdapter<SeparateInput, PathBuf> for DemucsSeparator {
    async fn run(&self, input: SeparateInput) -> Result<PathBuf, StageError> {
        let demucs = self.demucs.clone();
        blocking(KIND, move || {
            let SeparateInput { audio, stems_root } = input;
            if !audio.is_file() {
                return Err(StageError::separation(format!(
                    "input audio missing: {}",
                    audio.display()
                )));
            }
            fs::create_dir_all(&stems_root).map_err(|e| {
                StageError::separation(format!("cannot create {}: {e}", stems_root.display()))
            })?;

            run_tool(
                KIND,
                &demucs,
                [
                    OsString::from("-o"),
                    stems_root.clone().into_os_string(),
                    audio.into_os_string(),
                ],
                None,
            )?;

            stem_folder(&stems_root)
        })
        .await
    }
}

/// demucs writes `<root>/<model>/<track>/{vocals,drums,bass,other}.wav`.
/// The stem folder is the one holding `vocals.wav`; any folder layout with
/// at least one `.wav` falls back to the root.
fn stem_folder(root: &Path) -> Result<PathBuf, StageError> {
    let mut wavs: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), "wav"))
        .map(|e| e.into_path())
        .collect();
    if wavs.is_empty() {
        return Err(StageError::separation(format!(
            "no stems produced under {}",
            root.display()
        )));
    }

    wavs.retain(|p| p.file_name().is_some_and(|n| n == "vocals.wav"));
    Ok(wavs
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf()))
}
