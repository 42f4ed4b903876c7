//! Scan session: the accumulator plus the at-most-once finalization guard

use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{
    ConsensusPolicy, FieldExtractor, FieldName, OccurrenceAccumulator, PatientAdmissionRecord,
};
use crate::vision::TextSnapshot;

/// What happened to one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The session already produced its record
    AlreadyFinalized,
    /// The OCR result had no usable text
    NoTextDetected,
    /// Candidates were recorded; consensus not reached yet
    Accumulated {
        stored: usize,
        outstanding: Vec<(FieldName, usize)>,
    },
    /// This snapshot completed consensus
    Finalized(PatientAdmissionRecord),
}

/// All state belonging to one scan attempt
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    accumulator: OccurrenceAccumulator,
    has_finalized: bool,
    snapshots_processed: usize,
    snapshots_empty: usize,
    extraction_failures: usize,
    started_at: Instant,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            accumulator: OccurrenceAccumulator::new(),
            has_finalized: false,
            snapshots_processed: 0,
            snapshots_empty: 0,
            extraction_failures: 0,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn has_finalized(&self) -> bool {
        self.has_finalized
    }

    pub fn accumulator(&self) -> &OccurrenceAccumulator {
        &self.accumulator
    }

    /// Snapshots that carried text
    pub fn snapshots_processed(&self) -> usize {
        self.snapshots_processed
    }

    /// Snapshots dropped for lack of text
    pub fn snapshots_empty(&self) -> usize {
        self.snapshots_empty
    }

    pub fn extraction_failures(&self) -> usize {
        self.extraction_failures
    }

    /// Extract, accumulate and test the stopping rule for one snapshot
    pub fn ingest(
        &mut self,
        snapshot: Option<TextSnapshot>,
        extractor: &FieldExtractor,
        policy: &ConsensusPolicy,
    ) -> IngestOutcome {
        if self.has_finalized {
            return IngestOutcome::AlreadyFinalized;
        }

        let Some(snapshot) = snapshot else {
            self.snapshots_empty += 1;
            return IngestOutcome::NoTextDetected;
        };

        self.snapshots_processed += 1;
        let extraction = extractor.extract(&snapshot);
        self.extraction_failures += extraction.failures;
        let stored = self.accumulator.extend(extraction.candidates);

        if let Some(record) = policy.resolve(&self.accumulator) {
            self.has_finalized = true;
            info!(
                "Session {} reached consensus after {} snapshots in {:?}",
                self.id,
                self.snapshots_processed,
                self.started_at.elapsed()
            );
            return IngestOutcome::Finalized(record);
        }

        let outstanding = policy.outstanding(&self.accumulator);
        debug!(
            "Session {}: frame {} stored {} candidates, {} fields outstanding",
            self.id,
            snapshot.frame_index,
            stored,
            outstanding.len()
        );
        IngestOutcome::Accumulated {
            stored,
            outstanding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ExtractionOptions;

    const SLIP: &str =
        "SK# 790112233\nSMITH, JOHN A\nDOB: 15-FEB-1980\nSex: M\nAdmit Date: 01-MAR-2024";

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&ExtractionOptions {
            reference_year: 2024,
            ..Default::default()
        })
    }

    fn snapshot(index: u64, text: &str) -> Option<TextSnapshot> {
        TextSnapshot::from_text(index, text)
    }

    #[test]
    fn test_repeated_slip_finalizes_on_fifth_snapshot() {
        let extractor = extractor();
        let policy = ConsensusPolicy::default();
        let mut session = SessionState::new();

        for i in 0..4 {
            let outcome = session.ingest(snapshot(i, SLIP), &extractor, &policy);
            assert!(matches!(outcome, IngestOutcome::Accumulated { .. }));
        }

        let IngestOutcome::Finalized(record) = session.ingest(snapshot(4, SLIP), &extractor, &policy)
        else {
            panic!("expected consensus on the fifth snapshot");
        };
        assert_eq!(record.billing_number(), "790112233");
        assert_eq!(record.last_name(), "SMITH");
        assert_eq!(record.first_name(), "JOHN");
        assert_eq!(record.middle_initial(), Some("A"));
        assert_eq!(record.date_of_birth(), "1980-02-15");
        assert_eq!(record.gender(), "M");
        assert_eq!(record.service_date(), Some("2024-03-01"));
        assert!(session.has_finalized());
    }

    #[test]
    fn test_finalizes_at_most_once() {
        let extractor = extractor();
        let policy = ConsensusPolicy::with_threshold(1);
        let mut session = SessionState::new();

        assert!(matches!(
            session.ingest(snapshot(0, SLIP), &extractor, &policy),
            IngestOutcome::Finalized(_)
        ));
        for i in 1..10 {
            assert_eq!(
                session.ingest(snapshot(i, SLIP), &extractor, &policy),
                IngestOutcome::AlreadyFinalized
            );
        }
        assert_eq!(session.snapshots_processed(), 1);
    }

    #[test]
    fn test_empty_snapshots_are_counted_not_accumulated() {
        let extractor = extractor();
        let policy = ConsensusPolicy::default();
        let mut session = SessionState::new();

        assert_eq!(
            session.ingest(None, &extractor, &policy),
            IngestOutcome::NoTextDetected
        );
        assert_eq!(session.snapshots_empty(), 1);
        assert_eq!(session.accumulator().total(), 0);
    }

    #[test]
    fn test_missing_billing_never_finalizes() {
        let extractor = extractor();
        let policy = ConsensusPolicy::default();
        let mut session = SessionState::new();
        let without_billing = "SMITH, JOHN A\nDOB: 15-FEB-1980\nSex: M\nAdmit Date: 01-MAR-2024";

        for i in 0..3 {
            session.ingest(snapshot(i, SLIP), &extractor, &policy);
        }
        for i in 3..8 {
            let outcome = session.ingest(snapshot(i, without_billing), &extractor, &policy);
            let IngestOutcome::Accumulated { outstanding, .. } = outcome else {
                panic!("session must not finalize");
            };
            assert_eq!(outstanding, vec![(FieldName::BillingNumber, 3)]);
        }
        assert!(!session.has_finalized());
        assert_eq!(session.accumulator().count(FieldName::LastName), 8);
    }

    #[test]
    fn test_majority_is_independent_of_snapshot_order() {
        use rand::seq::SliceRandom;

        let extractor = extractor();
        let policy = ConsensusPolicy::with_threshold(1000);
        let mut texts = vec![SLIP; 6];
        texts.push("SK# 790112238\nSMYTH, JOHN A\nDOB: 15-FEB-1980\nSex: M\nAdmit Date: 01-MAR-2024");
        texts.push("SK# 790112233\nSMITH, JOHN A\nDOB: 16-FEB-1980\nSex: F\nAdmit Date: 02-MAR-2024");

        let majority = |texts: &[&str]| {
            let mut session = SessionState::new();
            for (i, text) in texts.iter().enumerate() {
                session.ingest(snapshot(i as u64, text), &extractor, &policy);
            }
            assert!(!session.has_finalized());
            FieldName::ALL.map(|field| session.accumulator().most_frequent(field))
        };

        let baseline = majority(&texts[..]);
        assert_eq!(baseline[0].as_deref(), Some("790112233"));

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            texts.shuffle(&mut rng);
            assert_eq!(majority(&texts[..]), baseline);
        }
    }
}
