//! Field analysis
//!
//! Extracts structured admission fields from OCR snapshots and fuses repeated
//! observations into one record by majority vote.

pub mod check_digit;
pub mod consensus;
pub mod dates;
pub mod extractor;
pub mod names;
pub mod parsers;
pub mod record;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use consensus::{ConsensusPolicy, OccurrenceAccumulator};
pub use extractor::{ExtractionOptions, FieldExtractor};
pub use parsers::{FieldCategory, Parser};
pub use record::PatientAdmissionRecord;

/// Every field a scan can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    BillingNumber,
    FirstName,
    LastName,
    MiddleInitial,
    DateOfBirth,
    Gender,
    ServiceDate,
    VisitNumber,
    Mrn,
    AttendingPhysician,
    FamilyPhysician,
}

impl FieldName {
    /// All fields in record order
    pub const ALL: [FieldName; 11] = [
        FieldName::BillingNumber,
        FieldName::FirstName,
        FieldName::LastName,
        FieldName::MiddleInitial,
        FieldName::DateOfBirth,
        FieldName::Gender,
        FieldName::ServiceDate,
        FieldName::VisitNumber,
        FieldName::Mrn,
        FieldName::AttendingPhysician,
        FieldName::FamilyPhysician,
    ];

    /// Fields that must reach consensus before a record is built
    pub const REQUIRED: [FieldName; 6] = [
        FieldName::BillingNumber,
        FieldName::FirstName,
        FieldName::LastName,
        FieldName::DateOfBirth,
        FieldName::Gender,
        FieldName::ServiceDate,
    ];

    /// The camelCase key used in serialized records
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::BillingNumber => "billingNumber",
            FieldName::FirstName => "firstName",
            FieldName::LastName => "lastName",
            FieldName::MiddleInitial => "middleInitial",
            FieldName::DateOfBirth => "dateOfBirth",
            FieldName::Gender => "gender",
            FieldName::ServiceDate => "serviceDate",
            FieldName::VisitNumber => "visitNumber",
            FieldName::Mrn => "mrn",
            FieldName::AttendingPhysician => "attendingPhysician",
            FieldName::FamilyPhysician => "familyPhysician",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field value proposed by one parser from one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Field the value belongs to
    pub field: FieldName,
    /// Normalized value, never empty
    pub value: String,
    /// Index of the snapshot line the value was read from
    pub source_line: usize,
}

impl Candidate {
    /// Create a candidate, rejecting blank values
    pub fn new(field: FieldName, value: impl Into<String>, source_line: usize) -> Option<Self> {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            field,
            value: value.to_string(),
            source_line,
        })
    }
}

/// Internal parser failure, downgraded to "no match" by the extractor
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A pattern matched but an expected capture group was absent
    #[error("{parser}: capture group {group} missing")]
    MissingGroup { parser: &'static str, group: usize },
    /// A match was found but could not be turned into a value
    #[error("{parser}: {reason}")]
    Malformed { parser: &'static str, reason: String },
}
