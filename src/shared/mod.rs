//! Shared state and messaging between the capture thread and the controller
//!
//! The capture thread only ever sends [`CaptureMessage`]s and bumps
//! [`RuntimeStats`]; the controller owns everything else.

pub mod messages;
pub mod state;

pub use messages::{CaptureMessage, ScanEvent};
pub use state::{RuntimeStats, ScanState, SharedStats};
