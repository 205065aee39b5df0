//! Per-job working directory.
//!
//! ```text
//! <work_dir>/<job id>/
//!   raw/          downloaded audio
//!   stems/        separator output
//!   out/          package staging (or the organised drum kit)
//!   meta.json     key/tempo analysis
//!   package.zip   final artifact
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub fn new(work_dir: &Path, id: JobId) -> Self {
        Self {
            root: work_dir.join(id.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn stems_dir(&self) -> PathBuf {
        self.root.join("stems")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join("package.zip")
    }

    /// Audio already present in `raw/`, if any.
    pub fn existing_audio(&self) -> Option<PathBuf> {
        wav_files(&self.raw_dir()).into_iter().next()
    }
}

/// `.wav` files directly inside `dir`, sorted by name. Missing dir → empty.
pub fn wav_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, "wav"))
        .collect();
    files.sort();
    files
}

/// Audio to analyze: `mix.wav` of the stem folder, else its first `.wav`,
/// else the acquired audio.
pub fn analysis_target(stems: Option<&Path>, audio: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = stems {
        let mix = dir.join("mix.wav");
        if mix.is_file() {
            return Some(mix);
        }
        if let Some(first) = wav_files(dir).into_iter().next() {
            return Some(first);
        }
    }
    audio.map(Path::to_path_buf)
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn layout_is_keyed_by_job_id() {
        let id = JobId::from_ulid(Ulid::new());
        let ws = JobWorkspace::new(Path::new("/work"), id);

        assert_eq!(ws.root(), Path::new("/work").join(id.to_string()));
        assert!(ws.raw_dir().ends_with("raw"));
        assert!(ws.archive_path().ends_with("package.zip"));
    }

    #[test]
    fn existing_audio_finds_first_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::new(tmp.path(), JobId::from_ulid(Ulid::new()));
        assert_eq!(ws.existing_audio(), None);

        fs::create_dir_all(ws.raw_dir()).unwrap();
        fs::write(ws.raw_dir().join("b.wav"), b"").unwrap();
        fs::write(ws.raw_dir().join("a.WAV"), b"").unwrap();
        fs::write(ws.raw_dir().join("notes.txt"), b"").unwrap();

        assert_eq!(ws.existing_audio(), Some(ws.raw_dir().join("a.WAV")));
    }

    #[test]
    fn analysis_prefers_mix_then_first_stem_then_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let stems = tmp.path().join("stems");
        fs::create_dir_all(&stems).unwrap();
        let audio = tmp.path().join("song.wav");

        assert_eq!(analysis_target(Some(&stems), Some(&audio)), Some(audio.clone()));

        fs::write(stems.join("vocals.wav"), b"").unwrap();
        fs::write(stems.join("bass.wav"), b"").unwrap();
        assert_eq!(
            analysis_target(Some(&stems), Some(&audio)),
            Some(stems.join("bass.wav"))
        );

        fs::write(stems.join("mix.wav"), b"").unwrap();
        assert_eq!(
            analysis_target(Some(&stems), Some(&audio)),
            Some(stems.join("mix.wav"))
        );

        assert_eq!(analysis_target(None, None), None);
    }
}
