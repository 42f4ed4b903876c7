//! Camera Capture Layer
//!
//! A [`FrameSource`] yields frames; the capture worker pulls them at a fixed
//! rate on its own thread, runs OCR and hands the text to the controller.

pub mod frame;
pub mod replay;
pub mod worker;

use std::time::Duration;

use thiserror::Error;

pub use frame::{Frame, PixelFormat};
pub use replay::ReplaySource;
pub use worker::{spawn_camera, CameraHandle};

/// Errors raised by frame sources and the capture worker
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user or platform refused camera access
    #[error("camera permission denied")]
    PermissionDenied,
    /// The camera could not be opened or read
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// The capture thread could not be started
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A camera, or anything that behaves like one
pub trait FrameSource: Send {
    /// Short source name for logs
    fn name(&self) -> &str;

    /// Acquire the device; this is where permission is checked
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the device
    fn close(&mut self);
}

/// Camera capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frames per second pulled from the source
    pub target_fps: u32,
    /// Hand-offs buffered before new ones are dropped
    pub channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_fps: 10,
            channel_capacity: 32,
        }
    }
}

impl CaptureConfig {
    /// Time between two frame pulls
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_100ms() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        let config = CaptureConfig {
            target_fps: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }
}
