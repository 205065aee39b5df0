//! Command-line and environment configuration.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sampleforge_core::{EngineConfig, ToolPaths};

/// SampleForge job server
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "SAMPLEFORGE_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Root of the per-job working directories
    #[arg(long, env = "SAMPLEFORGE_WORK_DIR", default_value = "work")]
    pub work_dir: PathBuf,

    /// Jobs processed at the same time
    #[arg(long, env = "SAMPLEFORGE_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Forget finished jobs after this many seconds (kept forever if unset)
    #[arg(long, env = "SAMPLEFORGE_RETENTION_SECS")]
    pub retention_secs: Option<u64>,

    #[arg(long, env = "SAMPLEFORGE_YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: OsString,

    #[arg(long, env = "SAMPLEFORGE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: OsString,

    #[arg(long, env = "SAMPLEFORGE_DEMUCS", default_value = "demucs")]
    pub demucs: OsString,

    /// Key/tempo analyzer, run as `<analyzer> <audio-file>`.
    ///
    /// It must exit 0 and print one JSON object on stdout, e.g.
    /// `{"key": "A", "bpm": 124.2}`; either value may be null. Nothing in this
    /// package provides it, so point this at your own script.
    #[arg(long, env = "SAMPLEFORGE_ANALYZER", default_value = "sampleforge-analyze")]
    pub analyzer: OsString,

    #[arg(long, env = "SAMPLEFORGE_ZIP", default_value = "zip")]
    pub zip: OsString,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::builder()
            .with_work_dir(self.work_dir.clone())
            .with_max_concurrent_jobs(self.workers)
            .with_retention(self.retention_secs.map(Duration::from_secs))
            .with_tools(self.tools())
            .build()
    }

    fn tools(&self) -> ToolPaths {
        ToolPaths {
            yt_dlp: self.yt_dlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            demucs: self.demucs.clone(),
            analyzer: self.analyzer.clone(),
            zip: self.zip.clone(),
        }
    }
}
