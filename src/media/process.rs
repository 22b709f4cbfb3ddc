use super::{MediaError, MediaResult};
use std::ffi::OsString;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs `program` to completion and captures its output. A non-zero exit
/// status becomes [`MediaError::Failed`] carrying stderr. When `timeout`
/// elapses the child is killed.
pub(crate) async fn run(
    program: &str,
    args: &[OsString],
    timeout: Option<Duration>,
) -> MediaResult<Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    tracing::debug!(program, args = ?args, "spawning media process");

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| MediaError::Timeout {
                program: program.to_string(),
                secs: limit.as_secs(),
            })?,
        None => command.output().await,
    }
    .map_err(|source| MediaError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(MediaError::Failed {
            program: program.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}
