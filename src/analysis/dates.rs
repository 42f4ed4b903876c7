//! Date token parsing and birth/service disambiguation
//!
//! Admission slips print dates as `DD-MON-YYYY` or `MON-DD-YYYY`, sometimes
//! with a two-digit year, and OCR regularly confuses letters in the month
//! name with digits. Parsed dates are normalized to ISO `YYYY-MM-DD`.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::vision::TextSnapshot;

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})-([A-Z0-9]{3})-(\d{4}|\d{2})\b").expect("valid regex")
});

static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z0-9]{3})-(\d{1,2})-(\d{4}|\d{2})\b").expect("valid regex")
});

static BIRTH_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:DOB|D\.O\.B\.?|DATE\s+OF\s+BIRTH|BIRTH\s*DATE)\s*:?\s*$").expect("valid regex")
});

static SERVICE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ADMIT\s+DATE|ADMISSION\s+DATE|ADMIT|ADM)\s*:?\s*$").expect("valid regex")
});

/// OCR digit/letter confusions seen in month names
const MONTH_CORRECTIONS: [(&str, &str); 6] = [
    ("0CT", "OCT"),
    ("0EC", "DEC"),
    ("N0V", "NOV"),
    ("AU6", "AUG"),
    ("5EP", "SEP"),
    ("FE8", "FEB"),
];

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Default two-digit year pivot: below it is `20xx`, otherwise `19xx`
pub const DEFAULT_YEAR_PIVOT: u32 = 50;

/// Explicit label printed in front of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    /// `DOB:` and variants
    Birth,
    /// `Admit Date:` / `ADM:`
    Service,
}

/// A date found in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDate {
    pub date: NaiveDate,
    /// Snapshot line index
    pub line: usize,
    pub label: Option<DateLabel>,
}

/// Birth and service dates picked out of one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateAssignment {
    pub date_of_birth: Option<FoundDate>,
    pub service_date: Option<FoundDate>,
}

/// Resolve a three-letter month token, applying OCR corrections
pub fn month_number(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    let corrected = MONTH_CORRECTIONS
        .iter()
        .find(|(wrong, _)| *wrong == upper)
        .map(|(_, right)| *right)
        .unwrap_or(upper.as_str());

    MONTHS
        .iter()
        .position(|m| *m == corrected)
        .map(|i| i as u32 + 1)
}

/// Expand a two- or four-digit year
pub fn expand_year(raw: &str, pivot: u32) -> Option<i32> {
    let value: u32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(value as i32),
        2 if value < pivot => Some(2000 + value as i32),
        2 => Some(1900 + value as i32),
        _ => None,
    }
}

fn build_date(day: &str, month: &str, year: &str, pivot: u32) -> Option<NaiveDate> {
    let day: u32 = day.parse().ok()?;
    let month = month_number(month)?;
    let year = expand_year(year, pivot)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a single raw date token such as `12-0CT-1975` or `MAR-01-24`
pub fn parse_date(raw: &str, pivot: u32) -> Option<NaiveDate> {
    let upper = raw.trim().to_ascii_uppercase();
    if let Some(caps) = DAY_FIRST.captures(&upper) {
        if caps.get(0).map(|m| m.len()) == Some(upper.len()) {
            return build_date(&caps[1], &caps[2], &caps[3], pivot);
        }
    }
    if let Some(caps) = MONTH_FIRST.captures(&upper) {
        if caps.get(0).map(|m| m.len()) == Some(upper.len()) {
            return build_date(&caps[2], &caps[1], &caps[3], pivot);
        }
    }
    None
}

/// Format a date as `YYYY-MM-DD`
pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn label_before(prefix: &str) -> Option<DateLabel> {
    if BIRTH_LABEL.is_match(prefix) {
        Some(DateLabel::Birth)
    } else if SERVICE_LABEL.is_match(prefix) {
        Some(DateLabel::Service)
    } else {
        None
    }
}

/// Collect every parseable date in the snapshot, top to bottom
pub fn find_dates(snapshot: &TextSnapshot, pivot: u32) -> Vec<FoundDate> {
    let mut found = Vec::new();

    for (line_idx, line) in snapshot.indexed_lines() {
        let upper = line.to_ascii_uppercase();
        let mut spans: Vec<(usize, usize, NaiveDate)> = Vec::new();

        for caps in DAY_FIRST.captures_iter(&upper) {
            let Some(whole) = caps.get(0) else { continue };
            if let Some(date) = build_date(&caps[1], &caps[2], &caps[3], pivot) {
                spans.push((whole.start(), whole.end(), date));
            }
        }
        for caps in MONTH_FIRST.captures_iter(&upper) {
            let Some(whole) = caps.get(0) else { continue };
            let overlaps = spans
                .iter()
                .any(|(s, e, _)| whole.start() < *e && *s < whole.end());
            if overlaps {
                continue;
            }
            if let Some(date) = build_date(&caps[2], &caps[1], &caps[3], pivot) {
                spans.push((whole.start(), whole.end(), date));
            }
        }

        spans.sort_by_key(|(start, _, _)| *start);
        for (start, _, date) in spans {
            found.push(FoundDate {
                date,
                line: line_idx,
                label: label_before(&upper[..start]),
            });
        }
    }

    found
}

/// Decide which dates are the birth date and the service date
///
/// With two or more dates the oldest is the birth date and the newest the
/// service date, whatever their labels say. A lone date follows its label;
/// unlabeled, it is a birth date when it lies more than `min_age_years`
/// before `reference_year`.
pub fn assign_dates(dates: &[FoundDate], reference_year: i32, min_age_years: i32) -> DateAssignment {
    match dates {
        [] => DateAssignment::default(),
        [only] => {
            let is_birth = match only.label {
                Some(DateLabel::Birth) => true,
                Some(DateLabel::Service) => false,
                None => reference_year - only.date.year() > min_age_years,
            };
            if is_birth {
                DateAssignment {
                    date_of_birth: Some(only.clone()),
                    service_date: None,
                }
            } else {
                DateAssignment {
                    date_of_birth: None,
                    service_date: Some(only.clone()),
                }
            }
        }
        _ => {
            // min_by_key keeps the first of equal dates, max_by_key the last
            let oldest = dates.iter().min_by_key(|d| d.date).cloned();
            let newest = dates.iter().max_by_key(|d| d.date).cloned();
            DateAssignment {
                date_of_birth: oldest,
                service_date: newest,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(text: &str) -> TextSnapshot {
        TextSnapshot::from_text(0, text).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_corrections() {
        assert_eq!(month_number("0CT"), Some(10));
        assert_eq!(month_number("0EC"), Some(12));
        assert_eq!(month_number("N0V"), Some(11));
        assert_eq!(month_number("AU6"), Some(8));
        assert_eq!(month_number("5EP"), Some(9));
        assert_eq!(month_number("FE8"), Some(2));
        assert_eq!(month_number("jan"), Some(1));
        assert_eq!(month_number("XYZ"), None);
        assert_eq!(month_number("123"), None);
    }

    #[test]
    fn test_year_pivot() {
        assert_eq!(expand_year("49", 50), Some(2049));
        assert_eq!(expand_year("50", 50), Some(1950));
        assert_eq!(expand_year("75", 50), Some(1975));
        assert_eq!(expand_year("2024", 50), Some(2024));
        assert_eq!(expand_year("202", 50), None);
    }

    #[test]
    fn test_parse_ocr_confused_month() {
        assert_eq!(parse_date("12-0CT-1975", 50), Some(ymd(1975, 10, 12)));
        assert_eq!(format_iso(parse_date("12-0CT-1975", 50).unwrap()), "1975-10-12");
    }

    #[test]
    fn test_parse_month_first_and_short_year() {
        assert_eq!(parse_date("MAR-01-24", 50), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date("Feb-15-1980", 50), Some(ymd(1980, 2, 15)));
    }

    #[test]
    fn test_parse_rejects_impossible_dates() {
        assert_eq!(parse_date("31-FEB-2020", 50), None);
        assert_eq!(parse_date("00-JAN-2020", 50), None);
        assert_eq!(parse_date("12-0CT-1975 extra", 50), None);
    }

    #[test]
    fn test_find_dates_with_labels() {
        let snap = snapshot("DOB: 15-FEB-1980\nSex: M\nAdmit Date: 01-MAR-2024\nADM: 02-MAR-2024");
        let dates = find_dates(&snap, 50);
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0].label, Some(DateLabel::Birth));
        assert_eq!(dates[0].line, 0);
        assert_eq!(dates[1].label, Some(DateLabel::Service));
        assert_eq!(dates[1].line, 2);
        assert_eq!(dates[2].label, Some(DateLabel::Service));
    }

    #[test]
    fn test_find_dates_multiple_on_one_line() {
        let snap = snapshot("23-JAN-1950 JUN-10-2024");
        let dates = find_dates(&snap, 50);
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].date, ymd(1950, 1, 23));
        assert_eq!(dates[1].date, ymd(2024, 6, 10));
    }

    #[test]
    fn test_two_dates_ignore_labels_and_order() {
        let snap = snapshot("Admit Date: 23-JAN-1950\nDOB: 10-JUN-2024");
        let dates = find_dates(&snap, 50);
        let assigned = assign_dates(&dates, 2024, 10);
        assert_eq!(assigned.date_of_birth.unwrap().date, ymd(1950, 1, 23));
        assert_eq!(assigned.service_date.unwrap().date, ymd(2024, 6, 10));
    }

    #[test]
    fn test_single_date_uses_label() {
        let snap = snapshot("DOB: 01-JAN-2020");
        let assigned = assign_dates(&find_dates(&snap, 50), 2024, 10);
        assert!(assigned.date_of_birth.is_some());
        assert!(assigned.service_date.is_none());

        let snap = snapshot("ADM: 01-JAN-1960");
        let assigned = assign_dates(&find_dates(&snap, 50), 2024, 10);
        assert!(assigned.date_of_birth.is_none());
        assert!(assigned.service_date.is_some());
    }

    #[test]
    fn test_single_unlabeled_date_uses_age() {
        let old = snapshot("15-FEB-1980");
        let assigned = assign_dates(&find_dates(&old, 50), 2024, 10);
        assert_eq!(assigned.date_of_birth.unwrap().date, ymd(1980, 2, 15));

        let recent = snapshot("15-FEB-2014");
        let assigned = assign_dates(&find_dates(&recent, 50), 2024, 10);
        assert!(assigned.date_of_birth.is_none());
        assert_eq!(assigned.service_date.unwrap().date, ymd(2014, 2, 15));
    }

    #[test]
    fn test_no_dates() {
        let snap = snapshot("SMITH, JOHN A\nSex: M");
        let dates = find_dates(&snap, 50);
        assert!(dates.is_empty());
        assert_eq!(assign_dates(&dates, 2024, 10), DateAssignment::default());
    }
}
