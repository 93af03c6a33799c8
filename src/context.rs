//! Scene context from the region-of-interest collaborator.
//!
//! The collaborator is given the path of a saved window crop and prints one
//! JSON document describing named regions (mana counters, cards, buttons).
//! The result only feeds the logs; a failure never ends a cycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::ExtractorSettings;
use crate::process::{self, ProcessFailure};

/// Errors from the context collaborator.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Extractor not available: {0}")]
    NotAvailable(String),

    #[error("Extractor timed out after {0}s")]
    Timeout(u64),

    #[error("Extractor failed: {0}")]
    Failed(String),

    #[error("Malformed extractor output: {0}")]
    MalformedOutput(String),
}

impl From<ProcessFailure> for ContextError {
    fn from(failure: ProcessFailure) -> Self {
        match failure {
            ProcessFailure::TimedOut(d) => ContextError::Timeout(d.as_secs()),
            other => ContextError::NotAvailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// One named region reported by the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOfInterest {
    pub name: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub width: i32,
    pub height: i32,
    /// Recognised value (a number or a string, depending on the region)
    pub value: Option<serde_json::Value>,
    pub playable: Option<bool>,
    pub error: Option<String>,
}

/// Structured scene data for one window crop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneContext {
    pub image_size: Option<ImageSize>,
    pub debug_image: Option<String>,
    pub rois: BTreeMap<String, RegionOfInterest>,
}

impl SceneContext {
    /// One-line `name=value` rendering for the logs.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .rois
            .iter()
            .map(|(name, roi)| match (&roi.value, &roi.error) {
                (Some(value), _) => format!("{}={}", name, value),
                (None, Some(_)) => format!("{}=error", name),
                (None, None) => match roi.playable {
                    Some(true) => format!("{}=playable", name),
                    _ => format!("{}=?", name),
                },
            })
            .collect();

        if parts.is_empty() {
            "no regions".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Produces scene context for a saved image.
#[async_trait]
pub trait ContextExtractor: Send + Sync {
    async fn extract(&self, image_path: &Path) -> Result<SceneContext, ContextError>;
}

/// Spawns the configured extractor program with the image path appended.
pub struct CommandContextExtractor {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandContextExtractor {
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn from_settings(settings: &ExtractorSettings) -> Self {
        Self::new(
            settings.command.clone(),
            settings.timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl ContextExtractor for CommandContextExtractor {
    async fn extract(&self, image_path: &Path) -> Result<SceneContext, ContextError> {
        let arg = image_path.to_string_lossy();
        let output = process::run_with_arg(&self.command, &arg, self.timeout).await?;

        if !output.status.success() {
            return Err(ContextError::Failed(process::describe_failure(&output)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ContextError::MalformedOutput(e.to_string()))
    }
}
