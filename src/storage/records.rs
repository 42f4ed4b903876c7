//! Hand-off of the finalized record to downstream screens

use std::collections::HashMap;

use anyhow::{Context, Result};

use super::database::Database;
use crate::analysis::PatientAdmissionRecord;

/// Well-known key the finalized record is stored under
pub const RECORD_KEY: &str = "scanned_admission_record";

/// Somewhere a finalized record can be left for the next screen
pub trait RecordStore: Send {
    fn save_record(&mut self, key: &str, record: &PatientAdmissionRecord) -> Result<()>;

    fn load_record(&self, key: &str) -> Result<Option<PatientAdmissionRecord>>;

    /// Returns whether a record was present
    fn clear_record(&mut self, key: &str) -> Result<bool>;
}

impl RecordStore for Database {
    fn save_record(&mut self, key: &str, record: &PatientAdmissionRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.put(key, &json)
    }

    fn load_record(&self, key: &str) -> Result<Option<PatientAdmissionRecord>> {
        match self.get(key)? {
            Some(json) => {
                let record = serde_json::from_str(&json)
                    .with_context(|| format!("Stored record under {} is corrupt", key))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn clear_record(&mut self, key: &str) -> Result<bool> {
        self.remove(key)
    }
}

/// Process-local store holding serialized records
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn save_record(&mut self, key: &str, record: &PatientAdmissionRecord) -> Result<()> {
        self.entries
            .insert(key.to_string(), serde_json::to_string(record)?);
        Ok(())
    }

    fn load_record(&self, key: &str) -> Result<Option<PatientAdmissionRecord>> {
        self.entries
            .get(key)
            .map(|json| serde_json::from_str(json).context("Stored record is corrupt"))
            .transpose()
    }

    fn clear_record(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
