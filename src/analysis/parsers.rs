//! Field parser strategies
//!
//! Each [`Parser`] recognizes one document layout for one field category.
//! The extractor runs the parsers of a category in registration order and
//! keeps the first that produces a value, so labeled forms are registered
//! ahead of unlabeled fallbacks.

use std::sync::LazyLock;

use regex::Regex;

use super::dates::{assign_dates, find_dates, format_iso};
use super::names::{self, find_patient_name_backward, find_patient_name_forward, PersonName};
use super::{check_digit, Candidate, ExtractError, FieldName};
use crate::vision::TextSnapshot;

static BILLING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bSK\s*#|\bHSN\s*:|\bHEALTH\s+SERVICES\s+NUMBER\s*:)\s*(\d{3}\s?\d{3}\s?\d{3})(?:\D|$)")
        .expect("valid regex")
});

static BILLING_TRIPLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{3} \d{3} \d{3})(?:\D|$)").expect("valid regex"));

static BILLING_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{9})(?:\D|$)").expect("valid regex"));

static VISIT_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bV\s*#\s*:?\s*([A-Z0-9][A-Z0-9\-]*)").expect("valid regex")
});

static VISIT_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bVISIT\s*#\s*:?\s*([A-Z0-9][A-Z0-9\-]*)").expect("valid regex")
});

static MRN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:MRN|MEDICAL\s+RECORD\s+NUMBER|PATIENT\s+ID)\s*:\s*([A-Z0-9][A-Z0-9\-]*)")
        .expect("valid regex")
});

static GENDER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSEX(?:\s*:\s*|\s+)([MF])\b").expect("valid regex"));

static GENDER_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s([MF])$").expect("valid regex"));

static ATTENDING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bATN\s*:\s*(.+?)\s*(?:\b(?:ATN|FAM|PCP)\s*:|$)").expect("valid regex")
});

static FAMILY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FAM|PCP)\s*:\s*(.+?)\s*(?:\b(?:ATN|FAM|PCP)\s*:|$)").expect("valid regex")
});

/// Number of trailing lines searched for unlabeled physician names
const TRAILING_PHYSICIAN_LINES: usize = 3;

/// Groups of fields a parser can fill; at most one parser per group wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    BillingNumber,
    VisitNumber,
    Mrn,
    PatientName,
    Dates,
    Gender,
    AttendingPhysician,
    FamilyPhysician,
}

/// A single recognition strategy
pub trait Parser: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Category this strategy fills
    fn category(&self) -> FieldCategory;

    /// Look for the field in one snapshot
    ///
    /// `Ok(None)` means this layout is not present.
    fn try_extract(&self, snapshot: &TextSnapshot) -> Result<Option<Vec<Candidate>>, ExtractError>;
}

/// Value normalizer applied to a pattern's first capture group
pub type Normalizer = fn(&str) -> Option<String>;

/// One regex, one field: the first line whose match normalizes wins
pub struct LinePattern {
    name: &'static str,
    category: FieldCategory,
    field: FieldName,
    regex: &'static LazyLock<Regex>,
    normalize: Normalizer,
}

impl LinePattern {
    pub fn new(
        name: &'static str,
        category: FieldCategory,
        field: FieldName,
        regex: &'static LazyLock<Regex>,
        normalize: Normalizer,
    ) -> Self {
        Self {
            name,
            category,
            field,
            regex,
            normalize,
        }
    }
}

impl Parser for LinePattern {
    fn name(&self) -> &'static str {
        self.name
    }

    fn category(&self) -> FieldCategory {
        self.category
    }

    fn try_extract(&self, snapshot: &TextSnapshot) -> Result<Option<Vec<Candidate>>, ExtractError> {
        for (idx, line) in snapshot.indexed_lines() {
            let Some(caps) = self.regex.captures(line) else {
                continue;
            };
            let raw = caps.get(1).ok_or(ExtractError::MissingGroup {
                parser: self.name,
                group: 1,
            })?;
            if let Some(value) = (self.normalize)(raw.as_str()) {
                return Ok(Candidate::new(self.field, value, idx).map(|c| vec![c]));
            }
        }
        Ok(None)
    }
}

/// Patient name `LAST, FIRST [MIDDLE]`, in one search direction
pub struct PatientNameParser {
    backward: bool,
}

impl PatientNameParser {
    pub fn forward() -> Self {
        Self { backward: false }
    }

    pub fn backward() -> Self {
        Self { backward: true }
    }
}

impl Parser for PatientNameParser {
    fn name(&self) -> &'static str {
        if self.backward {
            "patient-name-backward"
        } else {
            "patient-name-forward"
        }
    }

    fn category(&self) -> FieldCategory {
        FieldCategory::PatientName
    }

    fn try_extract(&self, snapshot: &TextSnapshot) -> Result<Option<Vec<Candidate>>, ExtractError> {
        let found = if self.backward {
            find_patient_name_backward(snapshot)
        } else {
            find_patient_name_forward(snapshot)
        };
        let Some((line, name)) = found else {
            return Ok(None);
        };

        let candidates: Vec<Candidate> = [
            Candidate::new(FieldName::LastName, name.last.as_str(), line),
            Candidate::new(FieldName::FirstName, name.first.as_str(), line),
            name.middle_initial()
                .and_then(|initial| Candidate::new(FieldName::MiddleInitial, initial, line)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if candidates.len() < 2 {
            return Err(ExtractError::Malformed {
                parser: self.name(),
                reason: format!("incomplete name on line {}", line),
            });
        }
        Ok(Some(candidates))
    }
}

/// Birth and service dates from every date token in the snapshot
pub struct DateParser {
    year_pivot: u32,
    reference_year: i32,
    dob_min_age_years: i32,
}

impl DateParser {
    pub fn new(year_pivot: u32, reference_year: i32, dob_min_age_years: i32) -> Self {
        Self {
            year_pivot,
            reference_year,
            dob_min_age_years,
        }
    }
}

impl Parser for DateParser {
    fn name(&self) -> &'static str {
        "dates"
    }

    fn category(&self) -> FieldCategory {
        FieldCategory::Dates
    }

    fn try_extract(&self, snapshot: &TextSnapshot) -> Result<Option<Vec<Candidate>>, ExtractError> {
        let found = find_dates(snapshot, self.year_pivot);
        if found.is_empty() {
            return Ok(None);
        }

        let assigned = assign_dates(&found, self.reference_year, self.dob_min_age_years);
        let candidates: Vec<Candidate> = [
            assigned
                .date_of_birth
                .and_then(|d| Candidate::new(FieldName::DateOfBirth, format_iso(d.date), d.line)),
            assigned
                .service_date
                .and_then(|d| Candidate::new(FieldName::ServiceDate, format_iso(d.date), d.line)),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok((!candidates.is_empty()).then_some(candidates))
    }
}

/// Unlabeled physician names near the bottom of the slip
///
/// Only applies when no `ATN:`/`FAM:`/`PCP:` label appears anywhere. The
/// patient's own name and denylisted placeholders are skipped; the first
/// remaining name is the attending physician, the second the family one.
pub struct TrailingPhysicianParser {
    slot: usize,
}

impl TrailingPhysicianParser {
    pub fn attending() -> Self {
        Self { slot: 0 }
    }

    pub fn family() -> Self {
        Self { slot: 1 }
    }
}

impl Parser for TrailingPhysicianParser {
    fn name(&self) -> &'static str {
        if self.slot == 0 {
            "attending-trailing"
        } else {
            "family-trailing"
        }
    }

    fn category(&self) -> FieldCategory {
        if self.slot == 0 {
            FieldCategory::AttendingPhysician
        } else {
            FieldCategory::FamilyPhysician
        }
    }

    fn try_extract(&self, snapshot: &TextSnapshot) -> Result<Option<Vec<Candidate>>, ExtractError> {
        let labeled = snapshot
            .lines()
            .iter()
            .any(|line| ATTENDING_LABEL.is_match(line) || FAMILY_LABEL.is_match(line));
        if labeled {
            return Ok(None);
        }

        let patient = names::find_patient_name(snapshot).map(|(_, name)| name);
        let field = if self.slot == 0 {
            FieldName::AttendingPhysician
        } else {
            FieldName::FamilyPhysician
        };

        let found = snapshot
            .tail(TRAILING_PHYSICIAN_LINES)
            .flat_map(|(idx, line)| names::name_matches(line).into_iter().map(move |n| (idx, n)))
            .filter(|(_, name)| name.is_acceptable() && !same_person(patient.as_ref(), name))
            .nth(self.slot);

        Ok(found
            .and_then(|(idx, name)| Candidate::new(field, name.display(), idx))
            .map(|c| vec![c]))
    }
}

fn same_person(patient: Option<&PersonName>, other: &PersonName) -> bool {
    patient.is_some_and(|p| p.last == other.last && p.first == other.first)
}

fn normalize_billing(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == 9 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

fn normalize_billing_checked(raw: &str) -> Option<String> {
    normalize_billing(raw).filter(|n| check_digit::is_valid(n))
}

fn normalize_identifier(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches('-').to_ascii_uppercase();
    value.chars().any(|c| c.is_ascii_digit()).then_some(value)
}

fn normalize_gender(raw: &str) -> Option<String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "M" => Some("M".to_string()),
        "F" => Some("F".to_string()),
        _ => None,
    }
}

/// The built-in parsers, in priority order
pub fn default_parsers(
    year_pivot: u32,
    reference_year: i32,
    dob_min_age_years: i32,
    validate_billing_check_digit: bool,
) -> Vec<Box<dyn Parser>> {
    let billing: Normalizer = if validate_billing_check_digit {
        normalize_billing_checked
    } else {
        normalize_billing
    };

    vec![
        Box::new(LinePattern::new(
            "billing-label",
            FieldCategory::BillingNumber,
            FieldName::BillingNumber,
            &BILLING_LABEL,
            billing,
        )),
        Box::new(LinePattern::new(
            "billing-triplet",
            FieldCategory::BillingNumber,
            FieldName::BillingNumber,
            &BILLING_TRIPLET,
            billing,
        )),
        Box::new(LinePattern::new(
            "billing-bare",
            FieldCategory::BillingNumber,
            FieldName::BillingNumber,
            &BILLING_BARE,
            billing,
        )),
        Box::new(LinePattern::new(
            "visit-short",
            FieldCategory::VisitNumber,
            FieldName::VisitNumber,
            &VISIT_SHORT,
            normalize_identifier,
        )),
        Box::new(LinePattern::new(
            "visit-long",
            FieldCategory::VisitNumber,
            FieldName::VisitNumber,
            &VISIT_LONG,
            normalize_identifier,
        )),
        Box::new(LinePattern::new(
            "mrn-label",
            FieldCategory::Mrn,
            FieldName::Mrn,
            &MRN_LABEL,
            normalize_identifier,
        )),
        Box::new(PatientNameParser::forward()),
        Box::new(PatientNameParser::backward()),
        Box::new(DateParser::new(year_pivot, reference_year, dob_min_age_years)),
        Box::new(LinePattern::new(
            "gender-label",
            FieldCategory::Gender,
            FieldName::Gender,
            &GENDER_LABEL,
            normalize_gender,
        )),
        Box::new(LinePattern::new(
            "gender-trailing",
            FieldCategory::Gender,
            FieldName::Gender,
            &GENDER_TRAILING,
            normalize_gender,
        )),
        Box::new(LinePattern::new(
            "attending-label",
            FieldCategory::AttendingPhysician,
            FieldName::AttendingPhysician,
            &ATTENDING_LABEL,
            names::normalize_physician,
        )),
        Box::new(TrailingPhysicianParser::attending()),
        Box::new(LinePattern::new(
            "family-label",
            FieldCategory::FamilyPhysician,
            FieldName::FamilyPhysician,
            &FAMILY_LABEL,
            names::normalize_physician,
        )),
        Box::new(TrailingPhysicianParser::family()),
    ]
}
