//! Scan Controller
//!
//! Owns the camera, the scan session and the record store. OCR results
//! arrive from the capture thread over a channel and are processed here one
//! at a time, so consensus and finalization never race each other.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{ConsensusPolicy, FieldExtractor, PatientAdmissionRecord};
use crate::capture::{spawn_camera, CameraHandle, CaptureConfig, CaptureError, FrameSource};
use crate::config::AppConfig;
use crate::session::{IngestOutcome, SessionState};
use crate::shared::{CaptureMessage, RuntimeStats, ScanEvent, ScanState, SharedStats};
use crate::storage::RecordStore;
use crate::vision::{OcrEngine, TextSnapshot};

/// Errors returned by controller commands
#[derive(Debug, Error)]
pub enum ScanError {
    /// The camera could not be opened
    #[error(transparent)]
    Camera(#[from] CaptureError),
    /// `start` was called without an open camera
    #[error("no camera is open")]
    NoCamera,
    /// The command is not valid in the current state
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: ScanState,
    },
}

/// Drives one camera through `Idle -> Scanning -> Finalizing -> Idle`
pub struct ScanController {
    state: ScanState,
    session: Option<SessionState>,
    camera: Option<CameraHandle>,
    extractor: FieldExtractor,
    policy: ConsensusPolicy,
    max_snapshots: Option<usize>,
    capture_config: CaptureConfig,
    store: Box<dyn RecordStore>,
    record_key: String,
    last_record: Option<PatientAdmissionRecord>,
    stats: SharedStats,
    scan_epoch: u64,
    frames_tx: Sender<CaptureMessage>,
    frames_rx: Receiver<CaptureMessage>,
    subscribers: Vec<Sender<ScanEvent>>,
}

impl ScanController {
    /// Create a controller from configuration
    pub fn new(config: &AppConfig, store: Box<dyn RecordStore>) -> Self {
        let capture_config = config.capture_config();
        let (frames_tx, frames_rx) = bounded(capture_config.channel_capacity);

        Self {
            state: ScanState::Idle,
            session: None,
            camera: None,
            extractor: FieldExtractor::new(&config.extraction_options()),
            policy: config.consensus_policy(),
            max_snapshots: config.consensus.max_snapshots,
            capture_config,
            store,
            record_key: config.storage.record_key.clone(),
            last_record: None,
            stats: Arc::new(RwLock::new(RuntimeStats::default())),
            scan_epoch: 0,
            frames_tx,
            frames_rx,
            subscribers: Vec::new(),
        }
    }

    /// Replace the field extractor, e.g. to add custom parsers
    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the stopping rule
    pub fn with_policy(mut self, policy: ConsensusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Subscribe to controller events from now on
    ///
    /// Each call returns its own receiver. Dropping it unsubscribes.
    pub fn events(&mut self) -> Receiver<ScanEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Runtime counters shared with the capture thread
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// The current session, if scanning or scanned
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// The most recently finalized record
    pub fn last_record(&self) -> Option<&PatientAdmissionRecord> {
        self.last_record.as_ref()
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Generation id of the open camera
    pub fn camera_id(&self) -> Option<Uuid> {
        self.camera.as_ref().map(CameraHandle::id)
    }

    /// Open a camera in preview mode
    ///
    /// Any previously open camera is stopped first. A refused permission is
    /// returned to the caller, who may try again.
    pub fn open_camera(
        &mut self,
        source: Box<dyn FrameSource>,
        ocr: Box<dyn OcrEngine>,
    ) -> Result<Uuid, ScanError> {
        if matches!(self.state, ScanState::Scanning | ScanState::Finalizing) {
            return Err(ScanError::InvalidState {
                action: "open camera",
                state: self.state,
            });
        }

        self.stop_camera();
        let camera = match spawn_camera(
            source,
            ocr,
            &self.capture_config,
            self.frames_tx.clone(),
            self.stats.clone(),
        ) {
            Ok(camera) => camera,
            Err(e) => {
                warn!("Could not open camera: {}", e);
                self.stats.write().set_error(e.to_string());
                return Err(e.into());
            }
        };

        let id = camera.id();
        self.camera = Some(camera);
        self.stats.write().clear_error();
        self.set_state(ScanState::Idle);
        Ok(id)
    }

    /// Begin a fresh scan session on the open camera
    pub fn start(&mut self) -> Result<Uuid, ScanError> {
        if self.state != ScanState::Idle {
            return Err(ScanError::InvalidState {
                action: "start",
                state: self.state,
            });
        }
        let camera = self.camera.as_ref().ok_or(ScanError::NoCamera)?;
        if !camera.is_running() {
            self.camera = None;
            return Err(ScanError::NoCamera);
        }

        let session = SessionState::new();
        let id = session.id();
        self.session = Some(session);
        self.scan_epoch += 1;
        camera.recognize_for(self.scan_epoch);
        info!("Scan session {} started (scan {})", id, self.scan_epoch);
        self.set_state(ScanState::Scanning);
        Ok(id)
    }

    /// Discard the session and go back to preview
    ///
    /// Snapshots still queued from the discarded session are ignored.
    pub fn retry(&mut self) {
        if let Some(camera) = &self.camera {
            camera.preview();
        }
        if let Some(session) = self.session.take() {
            debug!("Session {} discarded", session.id());
        }
        self.set_state(ScanState::Idle);
    }

    /// Stop the camera and abandon the scan
    ///
    /// Hand-offs already in flight are ignored when they arrive.
    pub fn cancel(&mut self) {
        self.stop_camera();
        self.session = None;
        self.set_state(ScanState::Cancelled);
    }

    /// Handle one message from the capture thread
    pub fn handle_message(&mut self, message: CaptureMessage) {
        if self.camera_id() != Some(message.camera()) {
            debug!("Ignoring hand-off from stale camera {}", message.camera());
            return;
        }

        match message {
            CaptureMessage::Snapshot {
                scan,
                frame_index,
                text,
                ..
            } => self.handle_snapshot(scan, frame_index, text),
            CaptureMessage::FrameError {
                frame_index, error, ..
            } => {
                debug!("Frame {} skipped: {}", frame_index, error);
            }
            CaptureMessage::SourceEnded { .. } => {
                self.camera = None;
                if self.state == ScanState::Scanning {
                    self.emit(ScanEvent::SourceEnded);
                    self.set_state(ScanState::Idle);
                }
            }
            CaptureMessage::SourceFailed { error, .. } => {
                self.camera = None;
                self.emit(ScanEvent::Error(error));
                if self.state == ScanState::Scanning {
                    self.set_state(ScanState::Idle);
                }
            }
        }
    }

    fn handle_snapshot(&mut self, scan: u64, frame_index: u64, text: Option<String>) {
        if !self.state.accepts_snapshots() {
            return;
        }
        if scan != self.scan_epoch {
            debug!("Ignoring frame {} from earlier scan {}", frame_index, scan);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let snapshot = text.and_then(|t| TextSnapshot::from_text(frame_index, &t));
        let outcome = session.ingest(snapshot, &self.extractor, &self.policy);
        let session_id = session.id();
        let snapshots = session.snapshots_processed();

        match outcome {
            IngestOutcome::Finalized(record) => self.finalize(record),
            IngestOutcome::Accumulated { outstanding, .. } => {
                self.emit(ScanEvent::Progress {
                    session: session_id,
                    snapshots,
                    outstanding,
                });

                if self.max_snapshots.is_some_and(|max| snapshots >= max) {
                    info!(
                        "Session {} gave up after {} snapshots without consensus",
                        session_id, snapshots
                    );
                    self.emit(ScanEvent::ConsensusNotReached {
                        session: session_id,
                        snapshots,
                    });
                    self.retry();
                }
            }
            IngestOutcome::NoTextDetected | IngestOutcome::AlreadyFinalized => {}
        }
    }

    fn finalize(&mut self, record: PatientAdmissionRecord) {
        self.set_state(ScanState::Finalizing);
        self.stop_camera();

        if let Err(e) = self.store.save_record(&self.record_key, &record) {
            warn!("Failed to store record under {}: {:#}", self.record_key, e);
            self.stats.write().set_error(e.to_string());
            self.emit(ScanEvent::Error(format!("failed to store record: {}", e)));
        }

        info!(
            "Record finalized for {}, {} ({})",
            record.last_name(),
            record.first_name(),
            record.billing_number()
        );
        self.emit(ScanEvent::Completed(record.clone()));
        self.last_record = Some(record);
        self.set_state(ScanState::Idle);
    }

    /// Handle every message already queued; returns how many were handled
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.frames_rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Block handling messages until the scan leaves `Scanning` or time runs out
    pub fn run_until_settled(&mut self, timeout: Duration) -> ScanState {
        let deadline = Instant::now() + timeout;
        while self.state == ScanState::Scanning {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.frames_rx.recv_timeout(remaining) {
                Ok(message) => self.handle_message(message),
                Err(RecvTimeoutError::Timeout) => {
                    debug!("Scan still running after {:?}", timeout);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.state
    }

    fn stop_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.stop();
            debug!("Camera {} stopped", camera.id());
        }
    }

    fn set_state(&mut self, state: ScanState) {
        if self.state != state {
            info!("Scan state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.emit(ScanEvent::StateChanged(state));
        }
    }

    fn emit(&mut self, event: ScanEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.stop_camera();
    }
}
