//! # Ganesha Pilot
//!
//! A vision-driven autopilot for a single desktop application window.
//!
//! Every cycle the pilot finds the target window, photographs it, asks a
//! vision model for the next mouse action, checks that answer against hard
//! coordinate bounds, translates it to screen coordinates and hands it to an
//! input collaborator.
//!
//! ## Features
//!
//! - **Window Lookup**: Foreground window matched by title or process name
//! - **Screen Capture**: Full-display capture under a timeout, cropped to the window
//! - **Vision Decisions**: OpenAI-compatible endpoint, strict validation, one corrective retry
//! - **Dispatch**: External input program, or dry-run logging
//! - **Scene Context**: Optional region-of-interest extractor, logged for review
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ganesha_pilot::{AgentLoop, PilotConfig};
//!
//! #[tokio::main]
//! async fn main() -> ganesha_pilot::Result<()> {
//!     let mut config = PilotConfig::load(None)?;
//!     config.dispatcher.dry_run = true;
//!     config.validate()?;
//!
//!     let agent = AgentLoop::from_config(&config)?;
//!     let summary = agent.run(&config.agent.target, 10).await;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Safety
//!
//! - Proposals outside `[min_x, max_x] × [min_y, max_y]` never reach the dispatcher
//! - Floats, unknown actions and missing reasoning are rejected
//! - A second invalid answer abandons the cycle instead of retrying again
//! - `max_events` is a hard ceiling on cycle attempts

pub mod action;
pub mod agent;
pub mod capture;
pub mod config;
pub mod context;
pub mod decision;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod prompt;
pub mod window;

mod process;

pub use action::{to_screen_coordinates, translate, ActionKind, ActionProposal, ScreenAction};
pub use agent::{AgentLoop, AgentState, CycleOutcome, RunSummary};
pub use capture::{
    clamp_bounds, crop_to, CaptureError, CommandScreenSource, ScreenCapturer, ScreenSource,
    WindowCapture,
};
#[cfg(feature = "screen-capture")]
pub use capture::XcapScreenSource;
pub use config::{HardBounds, PacingSettings, PilotConfig, VisionSettings};
pub use context::{CommandContextExtractor, ContextError, ContextExtractor, SceneContext};
pub use decision::{
    DecisionError, HttpVisionModel, ValidationOutcome, VisionDecisionClient, VisionModel,
};
pub use dispatch::{ActionDispatcher, CommandDispatcher, DispatchError, DryRunDispatcher};
pub use error::{PilotError, Result};
pub use geometry::{Rect, ScreenPoint, ScreenSize};
pub use window::{WindowError, WindowHandle, WindowLocator, WindowSource, XdotoolWindowSource};

/// Prelude for common imports
pub mod prelude {
    pub use crate::action::{ActionKind, ActionProposal, ScreenAction};
    pub use crate::agent::{AgentLoop, RunSummary};
    pub use crate::config::PilotConfig;
    pub use crate::error::{PilotError, Result};
    pub use crate::geometry::Rect;
    pub use crate::window::WindowHandle;
}
