//! Executing validated actions through the input collaborator.
//!
//! The collaborator receives the JSON-encoded [`ScreenAction`] as its last
//! argument and answers with `{"success": true}` or
//! `{"success": false, "error": "..."}` on stdout.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::action::ScreenAction;
use crate::config::DispatcherSettings;
use crate::process::{self, ProcessFailure};

/// Errors from the input collaborator.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Dispatcher not available: {0}")]
    NotAvailable(String),

    #[error("Dispatcher timed out after {0}s")]
    Timeout(u64),

    #[error("Action rejected: {0}")]
    Rejected(String),

    #[error("Malformed dispatcher output: {0}")]
    MalformedOutput(String),
}

impl From<ProcessFailure> for DispatchError {
    fn from(failure: ProcessFailure) -> Self {
        match failure {
            ProcessFailure::TimedOut(d) => DispatchError::Timeout(d.as_secs()),
            other => DispatchError::NotAvailable(other.to_string()),
        }
    }
}

/// Executes one physical input action at absolute screen coordinates.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, action: &ScreenAction) -> Result<(), DispatchError>;
}

#[derive(Debug, Deserialize)]
struct DispatchReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Spawns the configured input program once per action.
pub struct CommandDispatcher {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandDispatcher {
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn from_settings(settings: &DispatcherSettings) -> Self {
        Self::new(
            settings.command.clone(),
            settings.timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl ActionDispatcher for CommandDispatcher {
    async fn dispatch(&self, action: &ScreenAction) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(action)
            .map_err(|e| DispatchError::MalformedOutput(e.to_string()))?;
        let output = process::run_with_arg(&self.command, &payload, self.timeout).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply = serde_json::from_str::<DispatchReply>(stdout.trim());

        match (output.status.success(), reply) {
            (true, Ok(DispatchReply { success: true, .. })) => Ok(()),
            (_, Ok(DispatchReply { success: false, error })) => Err(DispatchError::Rejected(
                error.unwrap_or_else(|| "no error message".to_string()),
            )),
            (false, _) => Err(DispatchError::Rejected(process::describe_failure(&output))),
            (true, Err(e)) => Err(DispatchError::MalformedOutput(format!(
                "{}: {}",
                e,
                stdout.trim()
            ))),
        }
    }
}

/// Logs actions without touching any input device.
#[derive(Debug, Default)]
pub struct DryRunDispatcher;

#[async_trait]
impl ActionDispatcher for DryRunDispatcher {
    async fn dispatch(&self, action: &ScreenAction) -> Result<(), DispatchError> {
        tracing::info!(action = %action.action, point = %action.point(), "dry run: not dispatching");
        Ok(())
    }
}
