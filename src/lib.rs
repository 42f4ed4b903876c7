//! Admission Scanner - reads patient admission slips from a camera feed
//!
//! OCR text from successive frames is parsed into candidate field values,
//! fused by majority vote and finalized once every required field has been
//! read consistently enough.

pub mod analysis;
pub mod app;
pub mod capture;
pub mod config;
pub mod session;
pub mod shared;
pub mod storage;
pub mod vision;

pub use analysis::{ConsensusPolicy, FieldExtractor, FieldName, PatientAdmissionRecord};
pub use app::{ScanController, ScanError};
pub use config::AppConfig;
pub use shared::{ScanEvent, ScanState};
