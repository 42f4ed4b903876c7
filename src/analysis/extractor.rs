//! Field extractor
//!
//! Runs every registered parser against a snapshot and yields at most one
//! candidate per field. Parser failures never escape: they are logged and
//! count as "no match" for that category in that snapshot.

use std::collections::HashSet;

use chrono::Datelike;
use tracing::debug;

use super::dates::DEFAULT_YEAR_PIVOT;
use super::parsers::{default_parsers, FieldCategory, Parser};
use super::{Candidate, FieldName};
use crate::vision::TextSnapshot;

/// Tunables for the built-in parsers
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Two-digit years below this are `20xx`, others `19xx`
    pub year_pivot: u32,
    /// Year used to judge whether a lone date is a birth date
    pub reference_year: i32,
    /// A lone unlabeled date older than this many years is a birth date
    pub dob_min_age_years: i32,
    /// Drop billing numbers that fail the mod-11 check
    pub validate_billing_check_digit: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            year_pivot: DEFAULT_YEAR_PIVOT,
            reference_year: chrono::Local::now().year(),
            dob_min_age_years: 10,
            validate_billing_check_digit: false,
        }
    }
}

/// Result of extracting one snapshot
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// At most one candidate per field
    pub candidates: Vec<Candidate>,
    /// Parsers that failed and were downgraded to "no match"
    pub failures: usize,
}

impl Extraction {
    /// Whether nothing was recognized
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The candidate for a field, if any
    pub fn get(&self, field: FieldName) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.field == field)
    }
}

/// Ordered collection of parser strategies
pub struct FieldExtractor {
    parsers: Vec<Box<dyn Parser>>,
}

impl FieldExtractor {
    /// Create an extractor with the built-in parsers
    pub fn new(options: &ExtractionOptions) -> Self {
        Self::with_parsers(default_parsers(
            options.year_pivot,
            options.reference_year,
            options.dob_min_age_years,
            options.validate_billing_check_digit,
        ))
    }

    /// Create an extractor from an explicit parser list
    pub fn with_parsers(parsers: Vec<Box<dyn Parser>>) -> Self {
        Self { parsers }
    }

    /// Add a parser after the existing ones; it is tried last in its category
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// Number of registered parsers
    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    /// Extract candidates from one snapshot
    pub fn extract(&self, snapshot: &TextSnapshot) -> Extraction {
        let mut settled: HashSet<FieldCategory> = HashSet::new();
        let mut extraction = Extraction::default();

        for parser in &self.parsers {
            let category = parser.category();
            if settled.contains(&category) {
                continue;
            }

            match parser.try_extract(snapshot) {
                Ok(Some(candidates)) => {
                    let mut produced = false;
                    for candidate in candidates {
                        if candidate.value.is_empty() || extraction.get(candidate.field).is_some() {
                            continue;
                        }
                        extraction.candidates.push(candidate);
                        produced = true;
                    }
                    if produced {
                        settled.insert(category);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        "Parser {} failed on frame {}: {}",
                        parser.name(),
                        snapshot.frame_index,
                        e
                    );
                    extraction.failures += 1;
                    settled.insert(category);
                }
            }
        }

        debug!(
            "Frame {}: {} candidates from {} lines",
            snapshot.frame_index,
            extraction.candidates.len(),
            snapshot.len()
        );
        extraction
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(&ExtractionOptions::default())
    }
}
