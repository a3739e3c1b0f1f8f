//! Run api-linter and collect its output.

use aipguard_core::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args::Invocation;

/// Buffered output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Everything the tool wrote to stdout.
    pub stdout: String,
    /// 0 for a clean file, 1 when problems were reported.
    pub exit_code: i32,
}

/// Run `executable` with `invocation`, waiting for it to exit.
///
/// Exit codes 0 and 1 are success; api-linter uses 1 to signal findings.
/// stderr never reaches the caller, it is only logged.
pub async fn run(
    executable: &Path,
    invocation: &Invocation,
    timeout: Option<Duration>,
) -> Result<RunOutput> {
    let start = Instant::now();
    debug!(
        executable = %executable.display(),
        args = ?invocation.args,
        cwd = %invocation.cwd.display(),
        "Running api-linter"
    );

    let mut cmd = Command::new(executable);
    cmd.args(&invocation.args)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| {
                warn!(executable = %executable.display(), "api-linter timed out");
                Error::Timeout {
                    seconds: limit.as_secs(),
                }
            })?,
        None => cmd.output().await,
    }
    .map_err(|e| spawn_error(executable, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let duration_ms = start.elapsed().as_millis();

    match output.status.code() {
        Some(exit_code @ (0 | 1)) => {
            if !stderr.trim().is_empty() {
                debug!(stderr = %stderr.trim(), "api-linter stderr");
            }
            debug!(exit_code, duration_ms, "api-linter finished");
            Ok(RunOutput { stdout, exit_code })
        }
        code => {
            warn!(?code, stderr = %stderr.trim(), "api-linter failed");
            Err(Error::ProcessFailed {
                path: executable.to_path_buf(),
                code,
                stderr,
            })
        }
    }
}

fn spawn_error(executable: &Path, source: std::io::Error) -> Error {
    match source.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => Error::ExecutableNotFound {
            path: executable.to_path_buf(),
        },
        _ => Error::Spawn {
            path: executable.to_path_buf(),
            source,
        },
    }
}
