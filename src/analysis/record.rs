//! The finalized patient admission record

use serde::{Deserialize, Serialize};

use super::FieldName;

/// Structured output of a completed scan
///
/// Built once from the consensus values of a session and never modified
/// afterwards; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientAdmissionRecord {
    billing_number: String,
    first_name: String,
    last_name: String,
    middle_initial: Option<String>,
    date_of_birth: String,
    gender: String,
    service_date: Option<String>,
    visit_number: Option<String>,
    mrn: Option<String>,
    attending_physician: Option<String>,
    family_physician: Option<String>,
}

impl PatientAdmissionRecord {
    /// Build a record by looking up each field's consensus value
    ///
    /// Returns `None` if any of billing number, names, birth date or gender
    /// has no value.
    pub fn resolve<F>(mut value_of: F) -> Option<Self>
    where
        F: FnMut(FieldName) -> Option<String>,
    {
        Some(Self {
            billing_number: value_of(FieldName::BillingNumber)?,
            first_name: value_of(FieldName::FirstName)?,
            last_name: value_of(FieldName::LastName)?,
            middle_initial: value_of(FieldName::MiddleInitial),
            date_of_birth: value_of(FieldName::DateOfBirth)?,
            gender: value_of(FieldName::Gender)?,
            service_date: value_of(FieldName::ServiceDate),
            visit_number: value_of(FieldName::VisitNumber),
            mrn: value_of(FieldName::Mrn),
            attending_physician: value_of(FieldName::AttendingPhysician),
            family_physician: value_of(FieldName::FamilyPhysician),
        })
    }

    pub fn billing_number(&self) -> &str {
        &self.billing_number
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn middle_initial(&self) -> Option<&str> {
        self.middle_initial.as_deref()
    }

    pub fn date_of_birth(&self) -> &str {
        &self.date_of_birth
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn service_date(&self) -> Option<&str> {
        self.service_date.as_deref()
    }

    pub fn visit_number(&self) -> Option<&str> {
        self.visit_number.as_deref()
    }

    pub fn mrn(&self) -> Option<&str> {
        self.mrn.as_deref()
    }

    pub fn attending_physician(&self) -> Option<&str> {
        self.attending_physician.as_deref()
    }

    pub fn family_physician(&self) -> Option<&str> {
        self.family_physician.as_deref()
    }

    /// Value of any field by name
    pub fn get(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::BillingNumber => Some(self.billing_number()),
            FieldName::FirstName => Some(self.first_name()),
            FieldName::LastName => Some(self.last_name()),
            FieldName::MiddleInitial => self.middle_initial(),
            FieldName::DateOfBirth => Some(self.date_of_birth()),
            FieldName::Gender => Some(self.gender()),
            FieldName::ServiceDate => self.service_date(),
            FieldName::VisitNumber => self.visit_number(),
            FieldName::Mrn => self.mrn(),
            FieldName::AttendingPhysician => self.attending_physician(),
            FieldName::FamilyPhysician => self.family_physician(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatientAdmissionRecord {
        PatientAdmissionRecord::resolve(|field| match field {
            FieldName::BillingNumber => Some("790112233".into()),
            FieldName::FirstName => Some("JOHN".into()),
            FieldName::LastName => Some("SMITH".into()),
            FieldName::DateOfBirth => Some("1980-02-15".into()),
            FieldName::Gender => Some("M".into()),
            FieldName::ServiceDate => Some("2024-03-01".into()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_requires_core_fields() {
        let missing_gender = PatientAdmissionRecord::resolve(|field| match field {
            FieldName::Gender => None,
            other => Some(other.as_str().to_string()),
        });
        assert!(missing_gender.is_none());
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["billingNumber"], "790112233");
        assert_eq!(json["dateOfBirth"], "1980-02-15");
        assert_eq!(json["serviceDate"], "2024-03-01");
        assert!(json["middleInitial"].is_null());
        for field in FieldName::ALL {
            assert!(json.get(field.as_str()).is_some(), "missing key {}", field);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample();
        let text = serde_json::to_string(&record).unwrap();
        let parsed: PatientAdmissionRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_get_by_field() {
        let record = sample();
        assert_eq!(record.get(FieldName::LastName), Some("SMITH"));
        assert_eq!(record.get(FieldName::Mrn), None);
    }
}
