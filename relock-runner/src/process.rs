// Timed subprocess execution for the package manager call

use relock_core::{Invocation, RelockError, Result};
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Build the child command for `invocation`, running `program` in the
/// invocation's working directory. The child is killed if dropped.
pub fn build_command(invocation: &Invocation, program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .kill_on_drop(true);
    cmd
}

/// Run `cmd` to completion with stdout and stderr captured.
///
/// Dropping the output future on timeout drops the child, which kills it.
pub async fn run_captured(mut cmd: Command, timeout: Duration, description: &str) -> Result<Output> {
    debug!(command = %description, timeout_secs = timeout.as_secs(), "Spawning captured child");
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(RelockError::Spawn {
            command: description.to_string(),
            source,
        }),
        Err(_elapsed) => Err(RelockError::Timeout {
            command: description.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Run `cmd` to completion with the parent's stdio.
pub async fn run_inherited(mut cmd: Command, timeout: Duration, description: &str) -> Result<ExitStatus> {
    debug!(command = %description, timeout_secs = timeout.as_secs(), "Spawning inherited child");
    match tokio::time::timeout(timeout, cmd.status()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(source)) => Err(RelockError::Spawn {
            command: description.to_string(),
            source,
        }),
        Err(_elapsed) => Err(RelockError::Timeout {
            command: description.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Integer return code; a signal-terminated child reports `-signal`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
