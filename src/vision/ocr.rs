//! OCR (Optical Character Recognition) boundary
//!
//! The recognition engine itself is an external collaborator. This module
//! defines the seam it plugs into, plus a scripted engine that replays
//! pre-recognized transcripts.

use thiserror::Error;
use tracing::debug;

use crate::capture::frame::Frame;

/// Errors an OCR engine may report for a single frame
#[derive(Debug, Error)]
pub enum OcrError {
    /// The frame buffer could not be interpreted
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
    /// The engine failed while recognizing
    #[error("recognition failed: {0}")]
    Engine(String),
}

/// A text recognizer that turns one frame into plain text
///
/// Engines run inside the capture thread and may block for up to one frame
/// interval. `Ok(None)` means the frame carried no readable text.
pub trait OcrEngine: Send {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Run OCR on a frame
    fn recognize(&mut self, frame: &Frame) -> Result<Option<String>, OcrError>;
}

/// OCR engine that returns canned transcripts keyed by frame index
///
/// Frame `n` yields `transcripts[n % len]`, so a short script can drive a
/// long-running camera.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOcr {
    transcripts: Vec<Option<String>>,
}

impl ScriptedOcr {
    /// Create an engine from a list of transcripts (`None` = no text)
    pub fn new(transcripts: Vec<Option<String>>) -> Self {
        Self { transcripts }
    }

    /// Create an engine where every frame reads the same text
    pub fn repeating(text: impl Into<String>) -> Self {
        Self::new(vec![Some(text.into())])
    }

    /// Number of scripted transcripts
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    /// Whether the script is empty
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
}

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&mut self, frame: &Frame) -> Result<Option<String>, OcrError> {
        if self.transcripts.is_empty() {
            return Ok(None);
        }
        let slot = (frame.index % self.transcripts.len() as u64) as usize;
        debug!("Scripted OCR: frame {} -> transcript {}", frame.index, slot);
        Ok(self.transcripts[slot].clone())
    }
}
