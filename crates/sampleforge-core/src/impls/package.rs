//! Packaging: stage the deliverables, then archive them with `zip`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::process::{blocking, run_tool};
use crate::domain::{ArtifactRef, StageError, StageErrorKind};
use crate::ports::{PackageEntry, PackageInput, StageAdapter};

const KIND: StageErrorKind = StageErrorKind::Packaging;

pub struct ZipPackager {
    zip: OsString,
}

impl ZipPackager {
    pub fn new(zip: impl Into<OsString>) -> Self {
        Self { zip: zip.into() }
    }
}

#[async_trait]
impl StageAdapter<PackageInput, ArtifactRef> for ZipPackager {
    async fn run(&self, input: PackageInput) -> Result<ArtifactRef, StageError> {
        let zip = self.zip.clone();
        blocking(KIND, move || {
            let PackageInput {
                staging_dir,
                include,
                archive,
            } = input;

            fs::create_dir_all(&staging_dir).map_err(|e| io_error(&staging_dir, e))?;
            for entry in &include {
                copy_entry(entry, &staging_dir)?;
            }

            // zip runs inside the staging dir, so the archive path must not be relative
            let archive = std::path::absolute(&archive).map_err(|e| io_error(&archive, e))?;
            if archive.exists() {
                fs::remove_file(&archive).map_err(|e| io_error(&archive, e))?;
            }
            run_tool(
                KIND,
                &zip,
                [
                    OsString::from("-r"),
                    OsString::from("-q"),
                    archive.clone().into_os_string(),
                    OsString::from("."),
                ],
                Some(&staging_dir),
            )?;

            if !archive.is_file() {
                return Err(StageError::packaging(format!(
                    "archive missing after packaging: {}",
                    archive.display()
                )));
            }
            Ok(ArtifactRef::new(archive))
        })
        .await
    }
}

fn copy_entry(entry: &PackageEntry, staging_dir: &Path) -> Result<(), StageError> {
    let target = staging_dir.join(&entry.name);
    if entry.from.is_file() {
        fs::copy(&entry.from, &target).map_err(|e| io_error(&entry.from, e))?;
        return Ok(());
    }
    if !entry.from.is_dir() {
        return Err(StageError::packaging(format!(
            "missing package input {}",
            entry.from.display()
        )));
    }

    for item in WalkDir::new(&entry.from) {
        let item = item.map_err(|e| StageError::packaging(e.to_string()))?;
        let relative = item
            .path()
            .strip_prefix(&entry.from)
            .map_err(|e| StageError::packaging(e.to_string()))?;
        let dest: PathBuf = target.join(relative);
        if item.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| io_error(&dest, e))?;
        } else {
            fs::copy(item.path(), &dest).map_err(|e| io_error(item.path(), e))?;
        }
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> StageError {
    StageError::packaging(format!("{}: {e}", path.display()))
}
