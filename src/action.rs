//! Actions proposed by the vision model and their translation to the screen.
//!
//! A proposal's coordinates are relative to the captured window. The
//! translator adds the window origin to get the absolute point handed to the
//! dispatcher; it must only ever see proposals that passed validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{Rect, ScreenPoint};

/// The physical input actions the pilot may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Move the pointer without pressing anything
    Move,
    /// Press and release the primary button
    Click,
    /// Press the primary button and hold it
    DragStart,
    /// Release the primary button
    DragEnd,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Move,
        ActionKind::Click,
        ActionKind::DragStart,
        ActionKind::DragEnd,
    ];

    /// Wire name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Click => "click",
            ActionKind::DragStart => "drag_start",
            ActionKind::DragEnd => "drag_end",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// A validated decision from the vision model, in window-relative pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub reasoning: String,
    pub action: ActionKind,
    pub x: i32,
    pub y: i32,
}

/// An action in absolute screen coordinates, as sent to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenAction {
    pub action: ActionKind,
    pub x: i32,
    pub y: i32,
}

impl ScreenAction {
    pub fn point(&self) -> ScreenPoint {
        ScreenPoint {
            x: self.x,
            y: self.y,
        }
    }
}

/// Map a window-relative proposal onto the screen.
pub fn to_screen_coordinates(proposal: &ActionProposal, window_bounds: &Rect) -> ScreenPoint {
    ScreenPoint {
        x: window_bounds.x + proposal.x,
        y: window_bounds.y + proposal.y,
    }
}

/// Translate a proposal into the action the dispatcher executes.
pub fn translate(proposal: &ActionProposal, window_bounds: &Rect) -> ScreenAction {
    let point = to_screen_coordinates(proposal, window_bounds);
    ScreenAction {
        action: proposal.action,
        x: point.x,
        y: point.y,
    }
}
