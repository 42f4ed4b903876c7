//! Controller state and runtime counters

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

/// Scan controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ScanState {
    /// Camera may be previewing; no session
    #[default]
    Idle,
    /// Snapshots are being accumulated
    Scanning,
    /// Consensus reached; the record is being stored
    Finalizing,
    /// The user abandoned the scan
    Cancelled,
}

impl ScanState {
    /// Whether snapshots should be accumulated in this state
    pub fn accepts_snapshots(&self) -> bool {
        matches!(self, ScanState::Scanning)
    }
}

/// Runtime counters, not persisted
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeStats {
    /// Frames pulled from the source
    pub frames_captured: u64,
    /// Frames handed to the OCR engine
    pub frames_recognized: u64,
    /// Frames whose OCR result had no text
    pub frames_without_text: u64,
    /// Frames whose hand-off was dropped because the channel was full
    pub frames_dropped: u64,
    /// OCR failures
    pub ocr_errors: u64,
    /// Effective capture rate
    pub capture_fps: f32,
    /// Duration of the last OCR call
    pub last_ocr_ms: u64,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeStats {
    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

/// Counters shared between the capture thread and the controller
pub type SharedStats = Arc<RwLock<RuntimeStats>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_scanning_accepts_snapshots() {
        assert!(ScanState::Scanning.accepts_snapshots());
        assert!(!ScanState::Idle.accepts_snapshots());
        assert!(!ScanState::Finalizing.accepts_snapshots());
        assert!(!ScanState::Cancelled.accepts_snapshots());
    }

    #[test]
    fn test_error_state() {
        let stats: SharedStats = Arc::new(RwLock::new(RuntimeStats::default()));
        stats.write().set_error("camera busy");
        assert_eq!(stats.read().last_error.as_deref(), Some("camera busy"));
        stats.write().clear_error();
        assert!(stats.read().last_error.is_none());
    }
}
