//! Locating the target application window.
//!
//! Only the active (foreground) window is considered. A window matches when
//! the target fragment appears in its title or in its owning process name.
//! "Not found" is an ordinary outcome (the user alt-tabbed away) and is
//! reported as `Ok(None)`; errors mean the window system could not be queried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::geometry::Rect;

/// Errors that can occur while querying the window system.
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Window system not available: {0}")]
    NotAvailable(String),

    #[error("Window query failed: {0}")]
    QueryFailed(String),

    #[error("Unexpected window system output: {0}")]
    BadOutput(String),
}

/// Result type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// The targeted window at one instant. Never cached across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowHandle {
    pub title: String,
    pub owner_name: String,
    pub bounds: Rect,
}

impl WindowHandle {
    /// Check whether `fragment` appears in the title or the owner name.
    pub fn matches(&self, fragment: &str) -> bool {
        self.title.contains(fragment) || self.owner_name.contains(fragment)
    }
}

/// Source of the currently active window.
#[async_trait]
pub trait WindowSource: Send + Sync {
    /// Return the foreground window, or `None` when nothing has focus.
    async fn active_window(&self) -> WindowResult<Option<WindowHandle>>;
}

/// Finds the target window among the active ones.
pub struct WindowLocator {
    source: Box<dyn WindowSource>,
}

impl WindowLocator {
    pub fn new(source: Box<dyn WindowSource>) -> Self {
        Self { source }
    }

    /// Locate the window whose title or owner contains `target`.
    pub async fn locate(&self, target: &str) -> WindowResult<Option<WindowHandle>> {
        let Some(window) = self.source.active_window().await? else {
            tracing::debug!("no active window");
            return Ok(None);
        };

        if window.matches(target) {
            Ok(Some(window))
        } else {
            tracing::debug!(
                title = %window.title,
                owner = %window.owner_name,
                "active window does not match target"
            );
            Ok(None)
        }
    }
}

/// X11 window source backed by `xdotool`.
pub struct XdotoolWindowSource {
    program: String,
}

impl XdotoolWindowSource {
    pub fn new() -> Self {
        Self {
            program: "xdotool".to_string(),
        }
    }

    /// Use a different `xdotool` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> WindowResult<std::process::Output> {
        Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WindowError::NotAvailable(format!("{}: {}", self.program, e)))
    }

    async fn query(&self, args: &[&str]) -> WindowResult<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(WindowError::QueryFailed(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn owner_name(&self, window_id: &str) -> String {
        let pid = match self.query(&["getwindowpid", window_id]).await {
            Ok(pid) => pid,
            Err(e) => {
                tracing::debug!("no pid for window {}: {}", window_id, e);
                return String::new();
            }
        };

        tokio::fs::read_to_string(format!("/proc/{}/comm", pid))
            .await
            .map(|name| name.trim().to_string())
            .unwrap_or_default()
    }
}

impl Default for XdotoolWindowSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowSource for XdotoolWindowSource {
    async fn active_window(&self) -> WindowResult<Option<WindowHandle>> {
        let output = self.run(&["getactivewindow"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return no_active_window(&self.program, stderr.trim()).map(|()| None);
        }
        let window_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if window_id.is_empty() {
            return Ok(None);
        }

        let title = self.query(&["getwindowname", &window_id]).await?;
        let geometry = self
            .query(&["getwindowgeometry", "--shell", &window_id])
            .await?;
        let bounds = parse_geometry(&geometry)
            .ok_or_else(|| WindowError::BadOutput(format!("geometry: {:?}", geometry)))?;
        let owner_name = self.owner_name(&window_id).await;

        Ok(Some(WindowHandle {
            title,
            owner_name,
            bounds,
        }))
    }
}

/// Classify a failed `getactivewindow`.
///
/// Only "nothing has focus" is `Ok`; an unreachable X server or any other
/// complaint is an error.
fn no_active_window(program: &str, stderr: &str) -> WindowResult<()> {
    if stderr.is_empty() || stderr.contains("_NET_ACTIVE_WINDOW") {
        return Ok(());
    }
    if stderr.contains("Can't open display") || stderr.contains("cannot open display") {
        return Err(WindowError::NotAvailable(format!("{}: {}", program, stderr)));
    }
    Err(WindowError::QueryFailed(format!(
        "{} getactivewindow: {}",
        program, stderr
    )))
}

/// Parse the `KEY=value` lines printed by `xdotool getwindowgeometry --shell`.
pub fn parse_geometry(output: &str) -> Option<Rect> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().parse::<i32>().ok();
        match key {
            "X" => x = value,
            "Y" => y = value,
            "WIDTH" => width = value,
            "HEIGHT" => height = value,
            _ => {}
        }
    }

    Some(Rect::new(x?, y?, width?, height?))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Option<WindowHandle>);

    #[async_trait]
    impl WindowSource for FixedSource {
        async fn active_window(&self) -> WindowResult<Option<WindowHandle>> {
            Ok(self.0.clone())
        }
    }

    fn window(title: &str, owner: &str) -> WindowHandle {
        WindowHandle {
            title: title.to_string(),
            owner_name: owner.to_string(),
            bounds: Rect::new(100, 50, 944, 590),
        }
    }

    #[tokio::test]
    async fn test_locate_by_title() {
        let locator = WindowLocator::new(Box::new(FixedSource(Some(window(
            "My Game - Ranked",
            "wine64",
        )))));
        let found = locator.locate("Game").await.unwrap();
        assert_eq!(found.unwrap().bounds, Rect::new(100, 50, 944, 590));
    }

    #[tokio::test]
    async fn test_locate_by_owner() {
        let locator = WindowLocator::new(Box::new(FixedSource(Some(window(
            "Untitled",
            "Hearthstone.exe",
        )))));
        assert!(locator.locate("Hearthstone").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrelated_window_is_not_found() {
        let locator = WindowLocator::new(Box::new(FixedSource(Some(window(
            "Unrelated App",
            "editor",
        )))));
        assert!(locator.locate("Game").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_active_window() {
        let locator = WindowLocator::new(Box::new(FixedSource(None)));
        assert!(locator.locate("Game").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_xdotool_is_an_error() {
        let source = XdotoolWindowSource::with_program("definitely-not-xdotool-4f1c");
        let result = source.active_window().await;
        assert!(matches!(result, Err(WindowError::NotAvailable(_))));
    }

    /// Install a fake `xdotool` that runs `body` as a shell script.
    #[cfg(unix)]
    fn fake_xdotool(body: &str) -> (tempfile::TempDir, XdotoolWindowSource) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xdotool");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let source = XdotoolWindowSource::with_program(path.to_string_lossy().to_string());
        (dir, source)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreachable_display_is_an_error() {
        let (_dir, source) =
            fake_xdotool("echo \"Error: Can't open display: (null)\" >&2\nexit 1\n");
        let result = source.active_window().await;
        assert!(matches!(result, Err(WindowError::NotAvailable(_))));

        let locator = WindowLocator::new(Box::new(source));
        assert!(locator.locate("Game").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nothing_focused_is_not_found() {
        let (_dir, source) = fake_xdotool(
            "echo 'XGetWindowProperty[_NET_ACTIVE_WINDOW] failed (code=1)' >&2\nexit 1\n",
        );
        assert!(source.active_window().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_window_id_is_not_found() {
        let (_dir, source) = fake_xdotool("exit 0\n");
        assert!(source.active_window().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unexpected_failure_is_an_error() {
        let (_dir, source) =
            fake_xdotool("echo 'BadWindow (invalid Window parameter)' >&2\nexit 1\n");
        let result = source.active_window().await;
        assert!(matches!(result, Err(WindowError::QueryFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_active_window_from_xdotool() {
        let (_dir, source) = fake_xdotool(
            r#"case "$1" in
  getactivewindow) echo 62914567 ;;
  getwindowname) echo 'Game - Ranked' ;;
  getwindowgeometry) printf 'WINDOW=62914567\nX=100\nY=50\nWIDTH=944\nHEIGHT=590\nSCREEN=0\n' ;;
  getwindowpid) exit 1 ;;
esac
"#,
        );
        let window = source.active_window().await.unwrap().unwrap();
        assert_eq!(window.title, "Game - Ranked");
        assert_eq!(window.owner_name, "");
        assert_eq!(window.bounds, Rect::new(100, 50, 944, 590));
    }

    #[test]
    fn test_parse_geometry() {
        let output = "WINDOW=62914567\nX=-20\nY=50\nWIDTH=944\nHEIGHT=590\nSCREEN=0\n";
        assert_eq!(parse_geometry(output), Some(Rect::new(-20, 50, 944, 590)));
    }

    #[test]
    fn test_parse_geometry_incomplete() {
        assert_eq!(parse_geometry("X=1\nY=2\nWIDTH=3\n"), None);
        assert_eq!(parse_geometry("garbage"), None);
    }
}
