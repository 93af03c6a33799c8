//! Error types for the Ganesha pilot.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::context::ContextError;
use crate::decision::DecisionError;
use crate::dispatch::DispatchError;
use crate::window::WindowError;

/// Result type alias using the pilot error type.
pub type Result<T> = std::result::Result<T, PilotError>;

/// Everything that can end a cycle (or the run, for configuration).
#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Window lookup failed: {0}")]
    Window(#[from] WindowError),

    #[error("Screen capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Decision failed: {0}")]
    Decision(#[from] DecisionError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Context extraction failed: {0}")]
    Context(#[from] ContextError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PilotError {
    /// Name of the component responsible, used as log context.
    pub fn component(&self) -> &'static str {
        match self {
            PilotError::Window(_) => "window",
            PilotError::Capture(_) => "capture",
            PilotError::Decision(_) => "decision",
            PilotError::Dispatch(_) => "dispatch",
            PilotError::Context(_) => "context",
            PilotError::Config(_) => "config",
            PilotError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: PilotError = CaptureError::Timeout(10_000).into();
        assert_eq!(
            err.to_string(),
            "Screen capture failed: Capture timed out after 10000 ms"
        );
        assert_eq!(err.component(), "capture");
    }
}
