//! Running the external collaborator programs.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;

use tokio::process::Command;

/// Why a collaborator process produced no output.
#[derive(Error, Debug)]
pub(crate) enum ProcessFailure {
    #[error("no command configured")]
    EmptyCommand,

    #[error("{0}: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Run `command` with `arg` appended and collect its output.
///
/// The child is killed if `timeout` elapses first.
pub(crate) async fn run_with_arg(
    command: &[String],
    arg: &str,
    timeout: Option<Duration>,
) -> Result<Output, ProcessFailure> {
    let (program, args) = command.split_first().ok_or(ProcessFailure::EmptyCommand)?;

    let output = Command::new(program)
        .args(args)
        .arg(arg)
        .kill_on_drop(true)
        .output();

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, output)
            .await
            .map_err(|_| ProcessFailure::TimedOut(limit))?,
        None => output.await,
    };

    result.map_err(|e| ProcessFailure::Spawn(program.clone(), e))
}

/// Trimmed stderr, or the exit status when stderr is empty.
pub(crate) fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        format!("exited with {}: {}", output.status, stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        assert_eq!(
            ProcessFailure::EmptyCommand.to_string(),
            "no command configured"
        );
        assert_eq!(
            ProcessFailure::TimedOut(Duration::from_secs(30)).to_string(),
            "timed out after 30s"
        );
        let spawn = ProcessFailure::Spawn(
            "python3".to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(spawn.to_string(), "python3: not found");
        assert!(std::error::Error::source(&spawn).is_some());
    }

    #[tokio::test]
    async fn test_empty_command() {
        let result = run_with_arg(&[], "{}", None).await;
        assert!(matches!(result, Err(ProcessFailure::EmptyCommand)));
    }
}
