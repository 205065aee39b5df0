//! Running external tools.
//!
//! Adapters shell out to command-line programs (yt-dlp, ffmpeg, demucs, zip,
//! the analyzer). Those calls block for a long time, so they always run on
//! Tokio's blocking pool via [`blocking`].

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use crate::domain::{StageError, StageErrorKind};

/// How many trailing stderr lines end up in an error message.
const STDERR_TAIL_LINES: usize = 5;

/// Run `program` with `args`, failing on spawn errors and non-zero exit.
pub fn run_tool<I, S>(
    kind: StageErrorKind,
    program: &OsStr,
    args: I,
    cwd: Option<&Path>,
) -> Result<Output, StageError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.to_string_lossy().into_owned();
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    tracing::debug!(tool = %name, ?cwd, "running external tool");

    let output = command
        .output()
        .map_err(|e| StageError::new(kind, format!("failed to run {name}: {e}")))?;

    if !output.status.success() {
        return Err(StageError::new(
            kind,
            format!(
                "{name} failed ({}): {}",
                output.status,
                stderr_tail(&output.stderr)
            ),
        ));
    }
    Ok(output)
}

/// Is `program` runnable at all? Used for start-up diagnostics.
pub fn is_available(program: &OsStr, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Does `program` name an existing file, directly or through `PATH`?
///
/// For tools without a harmless probe argument.
pub fn resolves(program: &OsStr) -> bool {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|dirs| std::env::split_paths(&dirs).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Run blocking stage work off the async executor.
pub async fn blocking<T, F>(kind: StageErrorKind, f: F) -> Result<T, StageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StageError::new(kind, format!("{kind} worker crashed: {e}")))?
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
