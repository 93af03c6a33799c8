//! Prompt text sent to the vision model.

use std::path::Path;

use crate::action::ActionKind;
use crate::config::HardBounds;

/// Build the system policy from the bounds that are actually enforced.
pub fn policy_text(bounds: &HardBounds) -> String {
    let actions = ActionKind::ALL
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You control an application window through the mouse. You see one screenshot of the window per turn and choose exactly one action.

Allowed actions: {actions}.
- move: move the pointer to (x, y)
- click: click the primary button at (x, y)
- drag_start: press and hold the primary button at (x, y)
- drag_end: release the primary button at (x, y)

Coordinates are pixels relative to the top-left corner of the screenshot.
x must be an integer between {min_x} and {max_x}.
y must be an integer between {min_y} and {max_y}.
Anything outside these limits is rejected.

OUTPUT ONLY RAW JSON. NO MARKDOWN. NO EXPLANATION OUTSIDE THE JSON.
Schema:
{{"reasoning":"why this action","action":"click","x":100,"y":200}}"#,
        actions = actions,
        min_x = bounds.min_x,
        max_x = bounds.max_x,
        min_y = bounds.min_y,
        max_y = bounds.max_y,
    )
}

/// Load a replacement policy from `path`.
///
/// The file is advisory text for the model only; the numeric bounds are
/// enforced regardless of what it says.
pub fn load_policy(path: &Path) -> std::io::Result<String> {
    let text = std::fs::read_to_string(path)?;
    tracing::info!(
        path = %path.display(),
        "using custom policy prompt; configured bounds are still enforced"
    );
    Ok(text)
}

/// User text for the first attempt of a cycle.
pub fn user_text() -> String {
    "Here is the current window. Choose the next action.".to_string()
}

/// User text for the corrective retry.
pub fn retry_text(violation: &str) -> String {
    format!(
        "Here is the current window. Your previous answer was rejected: {}. \
         Choose the next action again and make sure it satisfies every rule.",
        violation
    )
}
