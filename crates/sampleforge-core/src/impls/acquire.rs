//! Audio acquisition through yt-dlp (with an ffmpeg fallback conversion).

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;

use super::process::{blocking, run_tool};
use super::workspace::wav_files;
use crate::domain::{StageError, StageErrorKind};
use crate::ports::{AcquireInput, StageAdapter};

const KIND: StageErrorKind = StageErrorKind::Acquisition;

pub struct YtDlpAcquirer {
    yt_dlp: OsString,
    ffmpeg: OsString,
}

impl YtDlpAcquirer {
    pub fn new(yt_dlp: impl Into<OsString>, ffmpeg: impl Into<OsString>) -> Self {
        Self {
            yt_dlp: yt_dlp.into(),
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[async_trait]
impl StageAdapter<AcquireInput, PathBuf> for YtDlpAcquirer {
    async fn run(&self, input: AcquireInput) -> Result<PathBuf, StageError> {
        if input.source.trim().is_empty() {
            return Err(StageError::acquisition("no source link provided"));
        }
        let yt_dlp = self.yt_dlp.clone();
        let ffmpeg = self.ffmpeg.clone();

        blocking(KIND, move || {
            let AcquireInput { source, raw_dir } = input;
            fs::create_dir_all(&raw_dir).map_err(|e| {
                StageError::acquisition(format!("cannot create {}: {e}", raw_dir.display()))
            })?;

            // yt-dlp picks the best audio stream and lets ffmpeg convert to wav
            let template = raw_dir.join("%(title)s.%(ext)s");
            let args: Vec<OsString> = vec![
                "-x".into(),
                "--audio-format".into(),
                "wav".into(),
                "-o".into(),
                template.into_os_string(),
                source.into(),
            ];
            run_tool(KIND, &yt_dlp, &args, None)?;

            if let Some(wav) = wav_files(&raw_dir).into_iter().next() {
                return Ok(wav);
            }

            // some extractors leave another container behind; normalise it
            let downloaded = first_file(&raw_dir)
                .ok_or_else(|| StageError::acquisition("No audio downloaded"))?;
            let wav = downloaded.with_extension("wav");
            run_tool(
                KIND,
                &ffmpeg,
                [
                    OsString::from("-y"),
                    OsString::from("-i"),
                    downloaded.into_os_string(),
                    wav.clone().into_os_string(),
                ],
                None,
            )?;
            if !wav.is_file() {
                return Err(StageError::acquisition(format!(
                    "ffmpeg produced no {}",
                    wav.display()
                )));
            }
            Ok(wav)
        })
        .await
    }
}

fn first_file(dir: &std::path::Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files.into_iter().next()
}
