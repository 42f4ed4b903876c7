//! Occurrence accumulation and majority-vote consensus
//!
//! Every candidate seen during a scan session is kept per field. The value
//! reported for a field is the one seen most often; among equally frequent
//! values the one that arrived first wins.

use std::collections::HashMap;

use super::record::PatientAdmissionRecord;
use super::{Candidate, FieldName};

/// Default number of agreeing reads required per field
pub const DEFAULT_THRESHOLD: usize = 5;

/// Per-field, insertion-ordered multiset of candidates
#[derive(Debug, Clone, Default)]
pub struct OccurrenceAccumulator {
    histories: HashMap<FieldName, Vec<Candidate>>,
}

impl OccurrenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate; blank values are ignored
    ///
    /// Returns whether the candidate was stored.
    pub fn append(&mut self, candidate: Candidate) -> bool {
        if candidate.value.trim().is_empty() {
            return false;
        }
        self.histories.entry(candidate.field).or_default().push(candidate);
        true
    }

    /// Record many candidates, returning how many were stored
    pub fn extend<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Candidate>,
    {
        candidates.into_iter().filter(|c| self.append(c.clone())).count()
    }

    /// Number of occurrences recorded for a field
    pub fn count(&self, field: FieldName) -> usize {
        self.histories.get(&field).map_or(0, Vec::len)
    }

    /// Total occurrences across all fields
    pub fn total(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    /// The majority value of a field
    ///
    /// Ties go to the value whose first occurrence is earliest.
    pub fn most_frequent(&self, field: FieldName) -> Option<String> {
        let history = self.histories.get(&field)?;

        // value -> (count, index of first occurrence)
        let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
        for (idx, candidate) in history.iter().enumerate() {
            tally.entry(candidate.value.as_str()).or_insert((0, idx)).0 += 1;
        }

        tally
            .into_iter()
            .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
                count_a.cmp(count_b).then_with(|| first_b.cmp(first_a))
            })
            .map(|(value, _)| value.to_string())
    }

    /// Drop every history
    pub fn reset(&mut self) {
        self.histories.clear();
    }
}

/// Stopping rule: how much agreement is enough to finalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusPolicy {
    /// Occurrences each required field needs
    pub threshold: usize,
    /// Fields that must all reach the threshold
    pub required: Vec<FieldName>,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            required: FieldName::REQUIRED.to_vec(),
        }
    }
}

impl ConsensusPolicy {
    /// Default required fields with a custom threshold
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            ..Self::default()
        }
    }

    /// Whether every required field has reached the threshold
    pub fn is_satisfied(&self, accumulator: &OccurrenceAccumulator) -> bool {
        self.required
            .iter()
            .all(|field| accumulator.count(*field) >= self.threshold)
    }

    /// Required fields still short of the threshold, with their counts
    pub fn outstanding(&self, accumulator: &OccurrenceAccumulator) -> Vec<(FieldName, usize)> {
        self.required
            .iter()
            .map(|field| (*field, accumulator.count(*field)))
            .filter(|(_, count)| *count < self.threshold)
            .collect()
    }

    /// Build the record if the stopping rule holds
    pub fn resolve(&self, accumulator: &OccurrenceAccumulator) -> Option<PatientAdmissionRecord> {
        if !self.is_satisfied(accumulator) {
            return None;
        }
        PatientAdmissionRecord::resolve(|field| accumulator.most_frequent(field))
    }
}
