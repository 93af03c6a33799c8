//! Configuration for the pilot.
//!
//! This module provides configuration structures for:
//! - The target window and event ceiling
//! - Vision endpoint, model and sampling parameters
//! - Hard coordinate bounds for proposed actions
//! - Capture, pacing and collaborator process settings
//!
//! Configuration is read from TOML. The first file found wins:
//! `--config <path>`, `.ganesha/pilot.toml`, then `<config dir>/ganesha/pilot.toml`.
//! Environment variables override the file, and CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Configuration file error: {path}: {source}")]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PilotConfig {
    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub vision: VisionSettings,

    #[serde(default)]
    pub bounds: HardBounds,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub pacing: PacingSettings,

    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    #[serde(default)]
    pub extractor: ExtractorSettings,
}

/// What to drive and for how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Substring of the target window title or owning process name
    pub target: String,
    /// Hard ceiling on cycle attempts
    pub max_events: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            target: "Hearthstone".to_string(),
            max_events: 50,
        }
    }
}

/// Vision inference endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Environment variable holding an optional bearer key
    pub api_key_env: String,
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub max_tokens: u32,
    /// Request timeout for the inference call
    pub timeout_secs: u64,
    /// Replace the generated policy prompt with this file
    pub policy_path: Option<PathBuf>,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
            model: "llava-v1.6-mistral-7b".to_string(),
            api_key_env: "GANESHA_PILOT_API_KEY".to_string(),
            temperature: 0.2,
            top_p: 0.9,
            repetition_penalty: 1.1,
            max_tokens: 300,
            timeout_secs: 90,
            policy_path: None,
        }
    }
}

impl VisionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the bearer key, if one is configured.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Window-relative coordinate limits every proposal must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for HardBounds {
    fn default() -> Self {
        Self {
            min_x: 0,
            max_x: 944,
            min_y: 0,
            max_y: 590,
        }
    }
}

impl HardBounds {
    pub fn contains_x(&self, x: i64) -> bool {
        x >= self.min_x as i64 && x <= self.max_x as i64
    }

    pub fn contains_y(&self, y: i64) -> bool {
        y >= self.min_y as i64 && y <= self.max_y as i64
    }
}

/// Screen capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Abandon the capture after this long
    pub timeout_ms: u64,
    /// Command writing a PNG of the whole display to stdout
    pub command: Vec<String>,
    /// Where window crops are written for the context extractor
    pub screenshot_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            command: vec![
                "import".to_string(),
                "-window".to_string(),
                "root".to_string(),
                "png:-".to_string(),
            ],
            screenshot_dir: std::env::temp_dir().join("ganesha-pilot"),
        }
    }
}

impl CaptureSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Delays between cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Wait after a dispatched action so the application can react
    pub settle_ms: u64,
    /// Wait between every pair of cycles
    pub inter_cycle_ms: u64,
    /// Extra wait after a skipped or abandoned cycle
    pub backoff_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            inter_cycle_ms: 500,
            backoff_ms: 2_000,
        }
    }
}

impl PacingSettings {
    /// No delays at all.
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            inter_cycle_ms: 0,
            backoff_ms: 0,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn inter_cycle(&self) -> Duration {
        Duration::from_millis(self.inter_cycle_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Action-dispatch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Program and leading arguments; the JSON action is appended
    pub command: Vec<String>,
    /// Give up waiting on the process after this long (unset waits forever)
    pub timeout_secs: Option<u64>,
    /// Log actions instead of executing them
    pub dry_run: bool,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string(), "mouse_control.py".to_string()],
            timeout_secs: Some(30),
            dry_run: false,
        }
    }
}

/// Context-extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub enabled: bool,
    /// Program and leading arguments; the image path is appended
    pub command: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            command: vec!["python3".to_string(), "extract_roi.py".to_string()],
            timeout_secs: Some(30),
        }
    }
}

impl PilotConfig {
    /// Load configuration from the first file found, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a single TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let project = Self::project_config_path();
        if project.exists() {
            return Some(project);
        }
        Self::global_config_path().filter(|p| p.exists())
    }

    /// Get project config path
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".ganesha/pilot.toml")
    }

    /// Get global config path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ganesha").join("pilot.toml"))
    }

    /// Load from environment variables (overrides config file)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(target) = std::env::var("GANESHA_PILOT_TARGET") {
            self.agent.target = target;
        }
        if let Ok(endpoint) = std::env::var("GANESHA_PILOT_ENDPOINT") {
            self.vision.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("GANESHA_PILOT_MODEL") {
            self.vision.model = model;
        }
        if let Ok(val) = std::env::var("GANESHA_PILOT_MAX_EVENTS") {
            match val.parse() {
                Ok(n) => self.agent.max_events = n,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid GANESHA_PILOT_MAX_EVENTS"),
            }
        }
        if let Ok(val) = std::env::var("GANESHA_PILOT_DRY_RUN") {
            self.dispatcher.dry_run = val == "1" || val.to_lowercase() == "true";
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.target.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "agent.target must not be empty".to_string(),
            ));
        }

        if self.agent.max_events == 0 {
            return Err(ConfigError::InvalidValue(
                "agent.max_events must be > 0".to_string(),
            ));
        }

        let b = &self.bounds;
        if b.min_x > b.max_x || b.min_y > b.max_y {
            return Err(ConfigError::InvalidValue(format!(
                "bounds are inverted: x∈[{},{}], y∈[{},{}]",
                b.min_x, b.max_x, b.min_y, b.max_y
            )));
        }

        if self.vision.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "vision.endpoint must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.vision.temperature) {
            return Err(ConfigError::InvalidValue(
                "vision.temperature must be between 0 and 2".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.vision.top_p) || self.vision.top_p == 0.0 {
            return Err(ConfigError::InvalidValue(
                "vision.top_p must be in (0, 1]".to_string(),
            ));
        }

        if self.vision.max_tokens == 0 {
            return Err(ConfigError::InvalidValue(
                "vision.max_tokens must be > 0".to_string(),
            ));
        }

        if self.capture.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "capture.timeout_ms must be > 0".to_string(),
            ));
        }

        // xcap captures directly and never runs the command
        if cfg!(not(feature = "screen-capture")) && self.capture.command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "capture.command must name a program".to_string(),
            ));
        }

        if !self.dispatcher.dry_run && self.dispatcher.command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "dispatcher.command must name a program".to_string(),
            ));
        }

        if self.extractor.enabled && self.extractor.command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "extractor.command must name a program".to_string(),
            ));
        }

        if self.dispatcher.dry_run {
            tracing::warn!("dispatcher is in dry-run mode; no input will be sent");
        }

        Ok(())
    }
}
