//! Message types exchanged between the capture thread, the controller and
//! whoever is watching the scan

use uuid::Uuid;

use crate::analysis::{FieldName, PatientAdmissionRecord};
use super::state::ScanState;

/// Messages sent from the capture thread to the controller
#[derive(Debug, Clone)]
pub enum CaptureMessage {
    /// OCR result for one frame; `text` is `None` when nothing was read
    ///
    /// `scan` is the scan epoch that was active when the frame was recognized.
    Snapshot {
        camera: Uuid,
        scan: u64,
        frame_index: u64,
        text: Option<String>,
    },
    /// Recognition failed for one frame
    FrameError {
        camera: Uuid,
        frame_index: u64,
        error: String,
    },
    /// The frame source has no more frames
    SourceEnded { camera: Uuid },
    /// The frame source failed and the capture thread exited
    SourceFailed { camera: Uuid, error: String },
}

impl CaptureMessage {
    /// Generation id of the camera that produced this message
    pub fn camera(&self) -> Uuid {
        match self {
            CaptureMessage::Snapshot { camera, .. }
            | CaptureMessage::FrameError { camera, .. }
            | CaptureMessage::SourceEnded { camera }
            | CaptureMessage::SourceFailed { camera, .. } => *camera,
        }
    }
}

/// Notifications emitted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The controller moved to a new state
    StateChanged(ScanState),
    /// A snapshot was accumulated; lists required fields still short of the threshold
    Progress {
        session: Uuid,
        snapshots: usize,
        outstanding: Vec<(FieldName, usize)>,
    },
    /// Consensus was reached and the record stored
    Completed(PatientAdmissionRecord),
    /// The snapshot limit was hit before consensus
    ConsensusNotReached { session: Uuid, snapshots: usize },
    /// The frame source ran dry while scanning
    SourceEnded,
    /// A recoverable error worth surfacing
    Error(String),
}
