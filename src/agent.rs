//! The agent loop.
//!
//! Each cycle runs locate → capture → (context) → decide → translate →
//! dispatch. A cycle that cannot finish is abandoned and logged; the loop
//! only stops when `max_events` cycles have been attempted.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::action::{translate, ActionProposal, ScreenAction};
use crate::capture::{self, ScreenCapturer, WindowCapture};
use crate::config::{PacingSettings, PilotConfig};
use crate::context::{CommandContextExtractor, ContextExtractor};
use crate::decision::{HttpVisionModel, VisionDecisionClient};
use crate::dispatch::{ActionDispatcher, CommandDispatcher, DryRunDispatcher};
use crate::error::Result;
use crate::geometry::Rect;
use crate::prompt;
use crate::window::{WindowLocator, XdotoolWindowSource};

/// State carried from one cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub last_action: Option<ActionProposal>,
    pub window_bounds: Option<Rect>,
    /// Cycle attempts so far, whatever their outcome
    pub event_count: u32,
}

impl AgentState {
    /// Record a finished cycle attempt.
    pub fn record(&mut self, outcome: &Result<CycleOutcome>) {
        if let Ok(CycleOutcome::Dispatched {
            proposal,
            window_bounds,
            ..
        }) = outcome
        {
            self.last_action = Some(proposal.clone());
            self.window_bounds = Some(*window_bounds);
        }
        self.event_count += 1;
    }
}

/// How a cycle that did not fail ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// An action was executed.
    Dispatched {
        proposal: ActionProposal,
        action: ScreenAction,
        window_bounds: Rect,
    },
    /// The target window was not in the foreground.
    Skipped,
}

/// Totals for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub max_events: u32,
    pub cycles_attempted: u32,
    pub actions_dispatched: u32,
    pub cycles_skipped: u32,
    pub cycles_failed: u32,
}

impl RunSummary {
    fn new(run_id: Uuid, max_events: u32) -> Self {
        Self {
            run_id,
            max_events,
            cycles_attempted: 0,
            actions_dispatched: 0,
            cycles_skipped: 0,
            cycles_failed: 0,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} cycles: {} dispatched, {} skipped, {} failed",
            self.cycles_attempted,
            self.max_events,
            self.actions_dispatched,
            self.cycles_skipped,
            self.cycles_failed
        )
    }
}

/// Supervises the capture → decide → act cycles.
pub struct AgentLoop {
    locator: WindowLocator,
    capturer: ScreenCapturer,
    decider: VisionDecisionClient,
    dispatcher: Box<dyn ActionDispatcher>,
    extractor: Option<Box<dyn ContextExtractor>>,
    pacing: PacingSettings,
    screenshot_dir: PathBuf,
}

impl AgentLoop {
    pub fn new(
        locator: WindowLocator,
        capturer: ScreenCapturer,
        decider: VisionDecisionClient,
        dispatcher: Box<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            locator,
            capturer,
            decider,
            dispatcher,
            extractor: None,
            pacing: PacingSettings::default(),
            screenshot_dir: std::env::temp_dir().join("ganesha-pilot"),
        }
    }

    /// Log scene context for every capture.
    pub fn with_extractor(mut self, extractor: Box<dyn ContextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_pacing(mut self, pacing: PacingSettings) -> Self {
        self.pacing = pacing;
        self
    }

    /// Where crops are saved for the context extractor.
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Wire up the real collaborators from configuration.
    pub fn from_config(config: &PilotConfig) -> Result<Self> {
        let locator = WindowLocator::new(Box::new(XdotoolWindowSource::new()));

        #[cfg(feature = "screen-capture")]
        let source: Box<dyn capture::ScreenSource> = Box::new(capture::XcapScreenSource);
        #[cfg(not(feature = "screen-capture"))]
        let source: Box<dyn capture::ScreenSource> =
            Box::new(capture::CommandScreenSource::new(config.capture.command.clone()));
        let capturer = ScreenCapturer::new(source, config.capture.timeout());

        let model = HttpVisionModel::new(&config.vision)?;
        let mut decider =
            VisionDecisionClient::new(Box::new(model), config.vision.clone(), config.bounds);
        if let Some(path) = &config.vision.policy_path {
            decider = decider.with_policy(prompt::load_policy(path)?);
        }

        let dispatcher: Box<dyn ActionDispatcher> = if config.dispatcher.dry_run {
            Box::new(DryRunDispatcher)
        } else {
            Box::new(CommandDispatcher::from_settings(&config.dispatcher))
        };

        let mut agent = Self::new(locator, capturer, decider, dispatcher)
            .with_pacing(config.pacing.clone())
            .with_screenshot_dir(config.capture.screenshot_dir.clone());
        if config.extractor.enabled {
            agent = agent.with_extractor(Box::new(CommandContextExtractor::from_settings(
                &config.extractor,
            )));
        }
        Ok(agent)
    }

    /// Run exactly `max_events` cycle attempts against `target`.
    pub async fn run(&self, target: &str, max_events: u32) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, window = target);
        self.run_inner(run_id, target, max_events)
            .instrument(span)
            .await
    }

    async fn run_inner(&self, run_id: Uuid, target: &str, max_events: u32) -> RunSummary {
        let mut state = AgentState::default();
        let mut summary = RunSummary::new(run_id, max_events);
        info!(max_events, "starting agent loop");

        while state.event_count < max_events {
            let event = state.event_count + 1;
            let outcome = self
                .run_cycle(target)
                .instrument(info_span!("cycle", event))
                .await;
            state.record(&outcome);
            summary.cycles_attempted = state.event_count;

            let delay = match &outcome {
                Ok(CycleOutcome::Dispatched { .. }) => {
                    summary.actions_dispatched += 1;
                    self.pacing.settle() + self.pacing.inter_cycle()
                }
                Ok(CycleOutcome::Skipped) => {
                    summary.cycles_skipped += 1;
                    self.pacing.backoff() + self.pacing.inter_cycle()
                }
                Err(e) => {
                    summary.cycles_failed += 1;
                    warn!(event, component = e.component(), error = %e, "cycle abandoned");
                    self.pacing.backoff() + self.pacing.inter_cycle()
                }
            };

            if state.event_count < max_events {
                pause(delay).await;
            }
        }

        info!(%summary, "agent loop finished");
        summary
    }

    /// One locate → capture → decide → dispatch cycle.
    pub async fn run_cycle(&self, target: &str) -> Result<CycleOutcome> {
        let Some(window) = self.locator.locate(target).await? else {
            info!(window = target, "target window not in foreground, skipping cycle");
            return Ok(CycleOutcome::Skipped);
        };
        debug!(title = %window.title, bounds = %window.bounds, "window located");

        let capture = self.capturer.capture_window(&window).await?;

        if let Some(extractor) = &self.extractor {
            if let Err(e) = self.log_context(extractor.as_ref(), &capture).await {
                warn!(component = e.component(), error = %e, "scene context unavailable");
            }
        }

        let proposal = self.decider.decide(&capture.image_bytes).await?;
        // Proposals are relative to the crop the model saw.
        let action = translate(&proposal, &capture.bounds);
        info!(
            action = %action.action,
            window_x = proposal.x,
            window_y = proposal.y,
            screen = %action.point(),
            reasoning = %proposal.reasoning,
            "dispatching action"
        );

        self.dispatcher.dispatch(&action).await?;

        Ok(CycleOutcome::Dispatched {
            proposal,
            action,
            window_bounds: capture.bounds,
        })
    }

    async fn log_context(
        &self,
        extractor: &dyn ContextExtractor,
        capture: &WindowCapture,
    ) -> Result<()> {
        let name = format!(
            "window-{}.png",
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
        );
        let path = capture::save_png(&capture.image_bytes, &self.screenshot_dir, &name).await?;
        let scene = extractor.extract(&path).await?;
        info!(image = %path.display(), scene = %scene.summary(), "scene context");
        Ok(())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::capture::CaptureError;

    fn dispatched() -> CycleOutcome {
        CycleOutcome::Dispatched {
            proposal: ActionProposal {
                reasoning: "end turn".to_string(),
                action: ActionKind::Click,
                x: 850,
                y: 280,
            },
            action: ScreenAction {
                action: ActionKind::Click,
                x: 950,
                y: 330,
            },
            window_bounds: Rect::new(100, 50, 944, 590),
        }
    }

    #[test]
    fn test_record_counts_every_attempt() {
        let mut state = AgentState::default();
        state.record(&Ok(CycleOutcome::Skipped));
        state.record(&Err(CaptureError::Timeout(10_000).into()));
        assert_eq!(state.event_count, 2);
        assert!(state.last_action.is_none());

        state.record(&Ok(dispatched()));
        assert_eq!(state.event_count, 3);
        assert_eq!(state.last_action.as_ref().map(|p| p.x), Some(850));
        assert_eq!(state.window_bounds, Some(Rect::new(100, 50, 944, 590)));
    }

    #[test]
    fn test_failure_keeps_last_action() {
        let mut state = AgentState::default();
        state.record(&Ok(dispatched()));
        state.record(&Err(CaptureError::Timeout(10_000).into()));
        assert_eq!(state.event_count, 2);
        assert!(state.last_action.is_some());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            run_id: Uuid::nil(),
            max_events: 5,
            cycles_attempted: 5,
            actions_dispatched: 3,
            cycles_skipped: 1,
            cycles_failed: 1,
        };
        assert_eq!(
            summary.to_string(),
            "5/5 cycles: 3 dispatched, 1 skipped, 1 failed"
        );
    }
}
