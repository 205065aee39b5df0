use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
///
/// Use [`EngineConfig::builder()`] for ergonomic construction, or
/// [`EngineConfig::default()`] for defaults (`./work`, two workers, no
/// retention sweep).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the per-job working directories.
    pub work_dir: PathBuf,

    /// Jobs executing at the same time. Excess submissions wait in FIFO order.
    pub max_concurrent_jobs: usize,

    /// Forget terminal jobs older than this. `None` keeps them for the
    /// process lifetime.
    pub retention: Option<Duration>,

    /// How often the retention sweep runs.
    pub sweep_interval: Duration,

    /// External programs used by the default adapters.
    pub tools: ToolPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            max_concurrent_jobs: 2,
            retention: None,
            sweep_interval: Duration::from_secs(60),
            tools: ToolPaths::default(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = n.max(1);
        self
    }

    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Program names or paths of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub yt_dlp: OsString,
    pub ffmpeg: OsString,
    pub demucs: OsString,
    /// Prints `{"key": .., "bpm": ..}` for the audio file passed as argument.
    pub analyzer: OsString,
    pub zip: OsString,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".into(),
            ffmpeg: "ffmpeg".into(),
            demucs: "demucs".into(),
            analyzer: "sampleforge-analyze".into(),
            zip: "zip".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("work"));
        assert_eq!(config.max_concurrent_jobs, 2);
        assert!(config.retention.is_none());
        assert_eq!(config.tools.demucs, OsString::from("demucs"));
    }

    #[test]
    fn builder_clamps_worker_count() {
        let config = EngineConfig::builder()
            .with_work_dir("/tmp/forge")
            .with_max_concurrent_jobs(0)
            .with_retention(Some(Duration::from_secs(3600)))
            .build();

        assert_eq!(config.work_dir, PathBuf::from("/tmp/forge"));
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.retention, Some(Duration::from_secs(3600)));
    }
}
