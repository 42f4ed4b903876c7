//! Frame source that replays blank frames
//!
//! Paired with [`ScriptedOcr`](crate::vision::ScriptedOcr) it stands in for a
//! real camera: the frame index selects the transcript.

use tracing::debug;

use super::{CaptureError, Frame, FrameSource};

/// Synthetic camera yielding pixel-less frames
#[derive(Debug, Clone)]
pub struct ReplaySource {
    limit: Option<u64>,
    next_index: u64,
    denied: bool,
    opened: bool,
}

impl ReplaySource {
    /// A source that ends after `frames` frames
    pub fn finite(frames: u64) -> Self {
        Self {
            limit: Some(frames),
            next_index: 0,
            denied: false,
            opened: false,
        }
    }

    /// A source that never ends
    pub fn endless() -> Self {
        Self {
            limit: None,
            ..Self::finite(0)
        }
    }

    /// A source whose `open` is refused
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::endless()
        }
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn open(&mut self) -> Result<(), CaptureError> {
        if self.denied {
            return Err(CaptureError::PermissionDenied);
        }
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.opened {
            return Err(CaptureError::Unavailable("source not opened".to_string()));
        }
        if self.limit.is_some_and(|limit| self.next_index >= limit) {
            return Ok(None);
        }
        let frame = Frame::blank(self.next_index);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.opened {
            debug!("Replay source closed after {} frames", self.next_index);
        }
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_source_ends() {
        let mut source = ReplaySource::finite(2);
        source.open().unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().index, 0);
        assert_eq!(source.next_frame().unwrap().unwrap().index, 1);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_denied_source() {
        let mut source = ReplaySource::denied();
        assert!(matches!(source.open(), Err(CaptureError::PermissionDenied)));
    }

    #[test]
    fn test_read_before_open_fails() {
        let mut source = ReplaySource::endless();
        assert!(source.next_frame().is_err());
        source.open().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        source.close();
        assert!(source.next_frame().is_err());
    }
}
