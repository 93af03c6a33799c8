//! Screen capture for the pilot.
//!
//! This module provides:
//! - Platform-abstracted full-display capture via the `ScreenSource` trait
//! - A capture timeout (the capture races a timer, the loser is dropped)
//! - Cropping to a window's bounds with edge clamping
//! - PNG encoding and saving crops for the context extractor

use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::geometry::{Rect, ScreenSize};
use crate::window::WindowHandle;

/// Errors that can occur during screen capture.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture timed out after {0} ms")]
    Timeout(u64),

    #[error("Window bounds {bounds} fall outside the {screen_width}x{screen_height} screen")]
    InvalidBounds {
        bounds: Rect,
        screen_width: i32,
        screen_height: i32,
    },

    #[error("Screen capture not available: {0}")]
    NotAvailable(String),

    #[error("Failed to capture screen: {0}")]
    CaptureFailed(String),

    #[error("Image encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Failed to save capture: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// A window crop owned by the cycle that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct WindowCapture {
    /// PNG-encoded crop
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    /// Clamped bounds actually captured
    pub bounds: Rect,
    pub window: WindowHandle,
}

/// Something that can photograph the whole display.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture(&self) -> CaptureResult<DynamicImage>;
}

/// Runs a command that writes a PNG of the whole display to stdout.
pub struct CommandScreenSource {
    command: Vec<String>,
}

impl CommandScreenSource {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ScreenSource for CommandScreenSource {
    async fn capture(&self) -> CaptureResult<DynamicImage> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| CaptureError::NotAvailable("no capture command configured".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptureError::NotAvailable(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(CaptureError::CaptureFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        image::load_from_memory(&output.stdout)
            .map_err(|e| CaptureError::CaptureFailed(format!("undecodable image: {}", e)))
    }
}

/// Cross-platform capture of the primary monitor using xcap.
#[cfg(feature = "screen-capture")]
pub struct XcapScreenSource;

#[cfg(feature = "screen-capture")]
#[async_trait]
impl ScreenSource for XcapScreenSource {
    async fn capture(&self) -> CaptureResult<DynamicImage> {
        let image = tokio::task::spawn_blocking(|| {
            let monitor = xcap::Monitor::all()
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?
                .into_iter()
                .find(|m| m.is_primary().unwrap_or(false))
                .ok_or_else(|| CaptureError::NotAvailable("no primary monitor".to_string()))?;

            monitor
                .capture_image()
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
        })
        .await
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))??;

        Ok(DynamicImage::ImageRgba8(image))
    }
}

/// Full-display capture under a timeout, plus window cropping.
pub struct ScreenCapturer {
    source: Box<dyn ScreenSource>,
    timeout: Duration,
}

impl ScreenCapturer {
    pub fn new(source: Box<dyn ScreenSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Capture the whole display, failing with `Timeout` if it takes too long.
    pub async fn capture_full_screen(&self) -> CaptureResult<DynamicImage> {
        match tokio::time::timeout(self.timeout, self.source.capture()).await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Capture the display and crop it to `window`.
    pub async fn capture_window(&self, window: &WindowHandle) -> CaptureResult<WindowCapture> {
        let full = self.capture_full_screen().await?;
        let screen = ScreenSize::new(full.width() as i32, full.height() as i32);
        let bounds = clamp_bounds(&window.bounds, &screen)?;
        let image_bytes = crop_to(&full, &window.bounds, &screen)?;

        tracing::debug!(
            screen = %format!("{}x{}", screen.width, screen.height),
            bounds = %bounds,
            bytes = image_bytes.len(),
            "captured window"
        );

        Ok(WindowCapture {
            image_bytes,
            bounds,
            window: window.clone(),
        })
    }
}

/// Clamp window bounds to the capturable surface.
///
/// `x' = max(0, x)`, `y' = max(0, y)`, `w' = min(w, screen.w - x')`,
/// `h' = min(h, screen.h - y')`. A non-positive result is `InvalidBounds`.
pub fn clamp_bounds(bounds: &Rect, screen: &ScreenSize) -> CaptureResult<Rect> {
    let x = bounds.x.max(0);
    let y = bounds.y.max(0);
    let clamped = Rect::new(
        x,
        y,
        bounds.width.min(screen.width.saturating_sub(x)),
        bounds.height.min(screen.height.saturating_sub(y)),
    );

    if !clamped.is_valid() {
        return Err(CaptureError::InvalidBounds {
            bounds: *bounds,
            screen_width: screen.width,
            screen_height: screen.height,
        });
    }

    Ok(clamped)
}

/// Crop `image` to the clamped `bounds` and encode the result as PNG.
pub fn crop_to(image: &DynamicImage, bounds: &Rect, screen: &ScreenSize) -> CaptureResult<Vec<u8>> {
    let clamped = clamp_bounds(bounds, screen)?;
    let cropped = image.crop_imm(
        clamped.x as u32,
        clamped.y as u32,
        clamped.width as u32,
        clamped.height as u32,
    );
    encode_png(&cropped)
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> CaptureResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Write PNG bytes to `dir/name`, creating the directory if needed.
pub async fn save_png(bytes: &[u8], dir: &Path, name: &str) -> CaptureResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
