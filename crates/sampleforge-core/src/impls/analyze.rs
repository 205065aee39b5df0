//! Key/tempo estimation through an external analyzer program.
//!
//! The analyzer receives the audio path as its only argument and prints a
//! single JSON object on stdout:
//!
//! ```json
//! { "key": "A", "bpm": 124.2 }
//! ```
//!
//! Either field may be `null` when the estimate is not available.

use std::ffi::OsString;
use std::fs;

use async_trait::async_trait;

use super::process::{blocking, run_tool};
use crate::domain::{StageError, StageErrorKind};
use crate::ports::{AnalyzeInput, AudioAnalysis, StageAdapter};

const KIND: StageErrorKind = StageErrorKind::Analysis;

pub struct CommandAnalyzer {
    program: OsString,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl StageAdapter<AnalyzeInput, AudioAnalysis> for CommandAnalyzer {
    async fn run(&self, input: AnalyzeInput) -> Result<AudioAnalysis, StageError> {
        let program = self.program.clone();
        blocking(KIND, move || {
            let AnalyzeInput { audio, meta_out } = input;
            if !audio.is_file() {
                return Err(StageError::analysis(format!(
                    "cannot read {}",
                    audio.display()
                )));
            }

            let output = run_tool(KIND, &program, [audio.as_os_str()], None)?;
            let analysis = parse_analysis(&String::from_utf8_lossy(&output.stdout))?;

            let json = serde_json::to_string_pretty(&analysis)
                .map_err(|e| StageError::analysis(format!("cannot encode analysis: {e}")))?;
            fs::write(&meta_out, json).map_err(|e| {
                StageError::analysis(format!("cannot write {}: {e}", meta_out.display()))
            })?;
            Ok(analysis)
        })
        .await
    }
}

fn parse_analysis(stdout: &str) -> Result<AudioAnalysis, StageError> {
    serde_json::from_str(stdout.trim())
        .map_err(|e| StageError::analysis(format!("unreadable analyzer output: {e}")))
}
