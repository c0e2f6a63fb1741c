use log::{debug, error};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;

use crate::errors::ProviderError;

// @module: External process invocation

/// Captured result of a finished external program
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    // @field: Standard output, lossily decoded
    pub stdout: String,

    // @field: Standard error, lossily decoded
    pub stderr: String,
}

/// Run `program` with `args` and wait for it to exit.
///
/// The child is killed if the returned future is dropped, so callers can race
/// this against a timeout without leaving orphaned processes behind.
pub async fn run_program<I, S>(program: &str, args: I) -> Result<ProcessOutput, ProviderError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", command.as_std());

    let output = command
        .output()
        .await
        .map_err(|e| ProviderError::LaunchFailed {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let filtered = filter_tool_stderr(&stderr);
        error!("{} failed: {}", program, filtered);
        return Err(ProviderError::ProcessFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: filtered,
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}

/// Whether `program` can be launched at all
pub async fn program_available(program: &str, version_flag: &str) -> bool {
    Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Keep only the stderr lines that describe what went wrong, dropping the
/// version banner, build configuration and stream metadata ffmpeg prints.
pub fn filter_tool_stderr(stderr: &str) -> String {
    const NOISE_PREFIXES: [&str; 18] = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "BPS",
        "DURATION",
        "NUMBER_OF",
        "_STATISTICS",
        "encoder",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown error (stderr was empty after filtering)".to_string()
    } else {
        // the tail is where tools put the actual failure
        let skip = meaningful.len().saturating_sub(10);
        meaningful[skip..].join("\n")
    }
}
