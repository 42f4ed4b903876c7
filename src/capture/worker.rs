//! Capture thread
//!
//! Pulls frames at the configured rate, runs OCR while a scan is active and
//! hands results to the controller. Snapshots are fire-and-forget; only the
//! end-of-stream notices wait for room in the channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CaptureConfig, CaptureError, FrameSource};
use crate::shared::{CaptureMessage, SharedStats};
use crate::vision::OcrEngine;

/// Scan epoch meaning "preview only"
const PREVIEW: u64 = 0;

/// Running camera owned by the controller
///
/// Dropping the handle stops the thread and closes the source.
pub struct CameraHandle {
    id: Uuid,
    stop_tx: Option<Sender<()>>,
    scan: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl CameraHandle {
    /// Generation id stamped on every message from this camera
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run OCR and tag every snapshot with `scan` (must be non-zero)
    pub fn recognize_for(&self, scan: u64) {
        debug_assert_ne!(scan, PREVIEW);
        self.scan.store(scan, Ordering::SeqCst);
    }

    /// Stop running OCR; frames keep flowing
    pub fn preview(&self) {
        self.scan.store(PREVIEW, Ordering::SeqCst);
    }

    /// Whether the capture thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to release the source
    ///
    /// Waits at most one frame's OCR. Idempotent.
    pub fn stop(&mut self) {
        self.preview();
        // Disconnecting the stop channel wakes the worker's select
        self.stop_tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Capture thread {} panicked", self.id);
            }
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Measures effective frame rate over one-second windows
#[derive(Debug)]
struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Count a frame; returns the rate when a window closes
    fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs_f32() < 1.0 {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.window_start = Instant::now();
        self.frames = 0;
        Some(fps)
    }
}

/// Open the source and start the capture thread in preview mode
///
/// The source is opened on the calling thread so a refused permission is
/// reported here and no thread is started.
pub fn spawn_camera(
    mut source: Box<dyn FrameSource>,
    ocr: Box<dyn OcrEngine>,
    config: &CaptureConfig,
    to_controller: Sender<CaptureMessage>,
    stats: SharedStats,
) -> Result<CameraHandle, CaptureError> {
    source.open()?;

    let id = Uuid::new_v4();
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
    let scan = Arc::new(AtomicU64::new(PREVIEW));

    // From here on the worker owns the source and closes it when dropped,
    // including when the thread fails to spawn
    let worker = Worker {
        camera: id,
        source,
        ocr,
        stop_rx,
        scan: scan.clone(),
        to_controller,
        stats,
    };
    let interval = config.frame_interval();

    let thread = std::thread::Builder::new()
        .name(format!("capture-{}", &id.simple().to_string()[..8]))
        .spawn(move || worker.run(interval))?;

    info!("Camera {} started at {:?} per frame", id, interval);

    Ok(CameraHandle {
        id,
        stop_tx: Some(stop_tx),
        scan,
        thread: Some(thread),
    })
}

struct Worker {
    camera: Uuid,
    source: Box<dyn FrameSource>,
    ocr: Box<dyn OcrEngine>,
    stop_rx: Receiver<()>,
    scan: Arc<AtomicU64>,
    to_controller: Sender<CaptureMessage>,
    stats: SharedStats,
}

impl Worker {
    fn run(mut self, interval: std::time::Duration) {
        debug!(
            "Capture thread starting: source={}, ocr={}",
            self.source.name(),
            self.ocr.name()
        );

        // tick() buffers a single pending tick, so a slow OCR call drops the
        // ticks it overran instead of bursting afterwards
        let ticker = tick(interval);
        let mut fps = FpsCounter::new();

        loop {
            select! {
                recv(self.stop_rx) -> _ => break,
                recv(ticker) -> _ => {}
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Camera {} source exhausted", self.camera);
                    self.send_final(CaptureMessage::SourceEnded {
                        camera: self.camera,
                    });
                    break;
                }
                Err(e) => {
                    warn!("Camera {} source failed: {}", self.camera, e);
                    self.stats.write().set_error(e.to_string());
                    self.send_final(CaptureMessage::SourceFailed {
                        camera: self.camera,
                        error: e.to_string(),
                    });
                    break;
                }
            };

            {
                let mut stats = self.stats.write();
                stats.frames_captured += 1;
                if let Some(rate) = fps.tick() {
                    stats.capture_fps = rate;
                }
            }

            // Preview: keep the camera live without recognizing
            let scan = self.scan.load(Ordering::SeqCst);
            if scan == PREVIEW {
                continue;
            }

            if !frame.is_consistent() {
                let (width, height) = frame.dimensions();
                let error = format!(
                    "{}x{} {:?} frame has {} bytes",
                    width,
                    height,
                    frame.format,
                    frame.data.len()
                );
                warn!("Skipping frame {}: {}", frame.index, error);
                self.stats.write().ocr_errors += 1;
                if !self.send(CaptureMessage::FrameError {
                    camera: self.camera,
                    frame_index: frame.index,
                    error,
                }) {
                    break;
                }
                continue;
            }

            let started = Instant::now();
            let result = self.ocr.recognize(&frame);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let message = {
                let mut stats = self.stats.write();
                stats.frames_recognized += 1;
                stats.last_ocr_ms = elapsed_ms;
                match result {
                    Ok(text) => {
                        if text.as_deref().map_or(true, |t| t.trim().is_empty()) {
                            stats.frames_without_text += 1;
                        }
                        CaptureMessage::Snapshot {
                            camera: self.camera,
                            scan,
                            frame_index: frame.index,
                            text,
                        }
                    }
                    Err(e) => {
                        stats.ocr_errors += 1;
                        warn!("OCR failed on frame {}: {}", frame.index, e);
                        CaptureMessage::FrameError {
                            camera: self.camera,
                            frame_index: frame.index,
                            error: e.to_string(),
                        }
                    }
                }
            };

            if !self.send(message) {
                break;
            }
        }

        debug!("Capture thread {} exiting", self.camera);
    }

    /// Fire-and-forget hand-off; returns false once the controller is gone
    fn send(&self, message: CaptureMessage) -> bool {
        match self.to_controller.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.write().frames_dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Deliver an end-of-stream notice, waiting for room unless stopped
    fn send_final(&self, message: CaptureMessage) {
        select! {
            send(self.to_controller, message) -> sent => {
                if sent.is_err() {
                    debug!("Controller for camera {} is gone", self.camera);
                }
            }
            recv(self.stop_rx) -> _ => {}
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, ReplaySource};
    use crate::shared::RuntimeStats;
    use crate::vision::ScriptedOcr;
    use parking_lot::RwLock;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn fast() -> CaptureConfig {
        CaptureConfig {
            target_fps: 500,
            channel_capacity: 64,
        }
    }

    fn stats() -> SharedStats {
        Arc::new(RwLock::new(RuntimeStats::default()))
    }

    /// Source that reports whether it was closed
    struct TrackedSource {
        closed: Arc<AtomicBool>,
        frames: Vec<Frame>,
    }

    impl FrameSource for TrackedSource {
        fn name(&self) -> &str {
            "tracked"
        }

        fn open(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            Ok(self.frames.pop())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_permission_denied_starts_nothing() {
        let (tx, _rx) = crossbeam_channel::bounded(4);
        let result = spawn_camera(
            Box::new(ReplaySource::denied()),
            Box::new(ScriptedOcr::repeating("X")),
            &fast(),
            tx,
            stats(),
        );
        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
    }

    #[test]
    fn test_preview_sends_nothing_until_source_ends() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let stats = stats();
        let mut camera = spawn_camera(
            Box::new(ReplaySource::finite(5)),
            Box::new(ScriptedOcr::repeating("SMITH, JOHN")),
            &fast(),
            tx,
            stats.clone(),
        )
        .unwrap();

        let id = camera.id();
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(message, CaptureMessage::SourceEnded { camera } if camera == id));
        camera.stop();

        let stats = stats.read();
        assert_eq!(stats.frames_captured, 5);
        assert_eq!(stats.frames_recognized, 0);
    }

    #[test]
    fn test_snapshots_carry_camera_and_scan_epoch() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut camera = spawn_camera(
            Box::new(ReplaySource::endless()),
            Box::new(ScriptedOcr::new(vec![Some("HELLO".into()), None])),
            &fast(),
            tx,
            stats(),
        )
        .unwrap();
        camera.recognize_for(7);

        let mut with_text = 0;
        let mut without_text = 0;
        while with_text + without_text < 4 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                CaptureMessage::Snapshot {
                    camera: id,
                    scan,
                    text,
                    ..
                } => {
                    assert_eq!(id, camera.id());
                    assert_eq!(scan, 7);
                    if text.is_some() {
                        with_text += 1;
                    } else {
                        without_text += 1;
                    }
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert!(with_text > 0 && without_text > 0);

        camera.stop();
        assert!(!camera.is_running());
        // Stopping twice is harmless
        camera.stop();
    }

    #[test]
    fn test_source_end_survives_full_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let stats = stats();
        let mut camera = spawn_camera(
            Box::new(ReplaySource::finite(10)),
            Box::new(ScriptedOcr::repeating("SMITH, JOHN")),
            &fast(),
            tx,
            stats.clone(),
        )
        .unwrap();
        camera.recognize_for(1);

        // Let the worker fill the channel and run out of frames
        std::thread::sleep(Duration::from_millis(300));

        let mut ended = false;
        while let Ok(message) = rx.recv_timeout(Duration::from_secs(5)) {
            if matches!(message, CaptureMessage::SourceEnded { .. }) {
                ended = true;
                break;
            }
        }
        assert!(ended);
        camera.stop();
        assert_eq!(stats.read().frames_captured, 10);
    }

    #[test]
    fn test_stop_does_not_wait_on_full_channel() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut camera = spawn_camera(
            Box::new(ReplaySource::finite(3)),
            Box::new(ScriptedOcr::repeating("X")),
            &fast(),
            tx,
            stats(),
        )
        .unwrap();
        camera.recognize_for(1);
        std::thread::sleep(Duration::from_millis(100));

        // Worker is parked on the end-of-stream notice; stop must still return
        camera.stop();
        assert!(!camera.is_running());
    }

    #[test]
    fn test_inconsistent_frame_is_reported_not_recognized() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let closed = Arc::new(AtomicBool::new(false));
        let source = TrackedSource {
            closed: closed.clone(),
            frames: vec![Frame::new(0, vec![0; 3], 2, 2, crate::capture::PixelFormat::Rgba8)],
        };
        let stats = stats();
        let mut camera = spawn_camera(
            Box::new(source),
            Box::new(ScriptedOcr::repeating("X")),
            &fast(),
            tx,
            stats.clone(),
        )
        .unwrap();
        camera.recognize_for(1);

        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // The frame may have been pulled during preview; then only the end notice arrives
        match message {
            CaptureMessage::FrameError { error, .. } => {
                assert!(error.contains("2x2"));
                assert_eq!(stats.read().frames_recognized, 0);
            }
            CaptureMessage::SourceEnded { .. } => {}
            other => panic!("unexpected message {:?}", other),
        }

        camera.stop();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropping_worker_closes_source() {
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let worker = Worker {
            camera: Uuid::new_v4(),
            source: Box::new(TrackedSource {
                closed: closed.clone(),
                frames: Vec::new(),
            }),
            ocr: Box::new(ScriptedOcr::default()),
            stop_rx,
            scan: Arc::new(AtomicU64::new(PREVIEW)),
            to_controller: tx,
            stats: stats(),
        };

        drop(worker);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fps_counter_reports_after_one_second() {
        let mut counter = FpsCounter::new();
        assert!(counter.tick().is_none());
        counter.window_start -= Duration::from_secs(2);
        let fps = counter.tick().unwrap();
        assert!(fps > 0.5 && fps < 1.5);
    }
}
