//! Default stage adapters backed by external programs.
//!
//! - **YtDlpAcquirer**: yt-dlp download, ffmpeg normalisation
//! - **DemucsSeparator**: demucs stem separation
//! - **CommandAnalyzer**: key/tempo from an analyzer printing JSON
//! - **DrumKitClassifier**: name-hint drum kit layout (in-process)
//! - **ZipPackager**: staging + `zip -r`

pub mod acquire;
pub mod analyze;
pub mod classify;
pub mod package;
pub mod process;
pub mod separate;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use crate::config::ToolPaths;
use crate::ports::StageSet;

pub use self::acquire::YtDlpAcquirer;
pub use self::analyze::CommandAnalyzer;
pub use self::classify::DrumKitClassifier;
pub use self::package::ZipPackager;
pub use self::separate::DemucsSeparator;
pub use self::workspace::JobWorkspace;

/// Adapters wired to the given tool locations.
pub fn default_stages(tools: &ToolPaths) -> StageSet {
    StageSet {
        acquire: Arc::new(YtDlpAcquirer::new(
            tools.yt_dlp.clone(),
            tools.ffmpeg.clone(),
        )),
        separate: Arc::new(DemucsSeparator::new(tools.demucs.clone())),
        analyze: Arc::new(CommandAnalyzer::new(tools.analyzer.clone())),
        classify: Arc::new(DrumKitClassifier::new()),
        package: Arc::new(ZipPackager::new(tools.zip.clone())),
    }
}

/// Tools that cannot be run: version probes for the well-known programs,
/// plain lookup for the analyzer.
pub fn missing_tools(tools: &ToolPaths) -> Vec<String> {
    let mut missing: Vec<String> = [
        (&tools.yt_dlp, "--version"),
        (&tools.ffmpeg, "-version"),
        (&tools.demucs, "--help"),
        (&tools.zip, "-v"),
    ]
    .into_iter()
    .filter(|(program, probe)| !process::is_available(program, probe))
    .map(|(program, _)| program.to_string_lossy().into_owned())
    .collect();

    if !process::resolves(&tools.analyzer) {
        missing.push(tools.analyzer.to_string_lossy().into_owned());
    }
    missing
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::impls::test_support::fake_tool;

    fn tools(analyzer: impl Into<std::ffi::OsString>) -> ToolPaths {
        ToolPaths {
            yt_dlp: "true".into(),
            ffmpeg: "true".into(),
            demucs: "true".into(),
            analyzer: analyzer.into(),
            zip: "true".into(),
        }
    }

    #[test]
    fn absent_analyzer_is_reported() {
        let missing = missing_tools(&tools("sampleforge-definitely-absent"));
        assert_eq!(missing, vec!["sampleforge-definitely-absent".to_string()]);
    }

    #[test]
    fn analyzer_file_counts_as_present() {
        let tmp = tempfile::tempdir().unwrap();
        let analyzer = fake_tool(tmp.path(), "analyze", r#"echo '{"key":null,"bpm":null}'"#);

        assert!(missing_tools(&tools(analyzer)).is_empty());
    }
}
