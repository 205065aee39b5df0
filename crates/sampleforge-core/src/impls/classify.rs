//! Drum kit organiser: sorts audio files into kit folders by name hint.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::process::blocking;
use super::workspace::wav_files;
use crate::domain::{StageError, StageErrorKind};
use crate::ports::{ClassifyInput, StageAdapter};

const KIT_FOLDERS: [&str; 4] = ["Kick", "Snare", "Hat", "Perc"];

#[derive(Debug, Default, Clone, Copy)]
pub struct DrumKitClassifier;

impl DrumKitClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Kit folder for a file name.
pub fn kit_folder(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    if name.contains("kick") || name.contains("drum") {
        "Kick"
    } else if name.contains("snare") {
        "Snare"
    } else if name.contains("hat") {
        "Hat"
    } else {
        "Perc"
    }
}

#[async_trait]
impl StageAdapter<ClassifyInput, PathBuf> for DrumKitClassifier {
    async fn run(&self, input: ClassifyInput) -> Result<PathBuf, StageError> {
        blocking(StageErrorKind::Classification, move || organize(&input)).await
    }
}

fn organize(input: &ClassifyInput) -> Result<PathBuf, StageError> {
    let files = wav_files(&input.source_dir);
    if files.is_empty() {
        return Err(StageError::classification(format!(
            "no audio files to organize in {}",
            input.source_dir.display()
        )));
    }

    for folder in KIT_FOLDERS {
        create_dir(&input.out_dir.join(folder))?;
    }
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = input
            .out_dir
            .join(kit_folder(&name.to_string_lossy()))
            .join(name);
        fs::copy(&file, &target).map_err(|e| {
            StageError::classification(format!("cannot copy {}: {e}", file.display()))
        })?;
    }
    Ok(input.out_dir.clone())
}

fn create_dir(dir: &Path) -> Result<(), StageError> {
    fs::create_dir_all(dir)
        .map_err(|e| StageError::classification(format!("cannot create {}: {e}", dir.display())))
}
