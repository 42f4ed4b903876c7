//! Person-name recognition for patients and physicians
//!
//! Names on admission slips are printed `LAST, FIRST [MIDDLE]` in capitals.
//! Staff titles and placeholder words share that shape, so matches carrying
//! a denylisted token are discarded.

use std::sync::LazyLock;

use regex::Regex;

use crate::vision::TextSnapshot;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Z'\-]+),\s*([A-Z][A-Z'\-]+)(?:\s+([A-Z][A-Z'\-]*))?\b")
        .expect("valid regex")
});

static PHYSICIAN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:ATN|FAM|PCP)\s*:").expect("valid regex"));

static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:DR|DOCTOR|PHYSICIAN)\b\.?\s*").expect("valid regex")
});

/// Words that never form part of a real patient name
pub const DENYLIST: [&str; 7] = [
    "PHYSICIAN",
    "UNASSIGNED",
    "DOCTOR",
    "DR",
    "NURSE",
    "TECH",
    "TECHNICIAN",
];

/// A `LAST, FIRST [MIDDLE]` name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub last: String,
    pub first: String,
    pub middle: Option<String>,
}

impl PersonName {
    /// First letter of the middle name, if any
    pub fn middle_initial(&self) -> Option<String> {
        self.middle
            .as_deref()
            .and_then(|m| m.chars().next())
            .map(|c| c.to_string())
    }

    /// Whether no part of the name is a denylisted word
    pub fn is_acceptable(&self) -> bool {
        !has_denylisted_token(&self.last)
            && !has_denylisted_token(&self.first)
            && !self.middle.as_deref().is_some_and(has_denylisted_token)
    }

    /// Render as `LAST, FIRST` or `LAST, FIRST MIDDLE`
    pub fn display(&self) -> String {
        match &self.middle {
            Some(middle) => format!("{}, {} {}", self.last, self.first, middle),
            None => format!("{}, {}", self.last, self.first),
        }
    }
}

fn has_denylisted_token(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
        .any(|t| DENYLIST.contains(&t.to_ascii_uppercase().as_str()))
}

fn name_from_captures(caps: &regex::Captures<'_>) -> Option<PersonName> {
    Some(PersonName {
        last: caps.get(1)?.as_str().to_string(),
        first: caps.get(2)?.as_str().to_string(),
        middle: caps.get(3).map(|m| m.as_str().to_string()),
    })
}

/// All name-shaped matches in a line, left to right
pub fn name_matches(line: &str) -> Vec<PersonName> {
    NAME_PATTERN
        .captures_iter(line)
        .filter_map(|caps| name_from_captures(&caps))
        .collect()
}

/// Whether the line carries an attending/family physician label
pub fn is_physician_line(line: &str) -> bool {
    PHYSICIAN_LABEL.is_match(line)
}

/// First acceptable name scanning top-down, one match per line
pub fn find_patient_name_forward(snapshot: &TextSnapshot) -> Option<(usize, PersonName)> {
    snapshot
        .indexed_lines()
        .filter(|(_, line)| !is_physician_line(line))
        .find_map(|(idx, line)| {
            let caps = NAME_PATTERN.captures(line)?;
            let name = name_from_captures(&caps)?;
            name.is_acceptable().then_some((idx, name))
        })
}

/// First acceptable name scanning bottom-up, every match per line from the right
pub fn find_patient_name_backward(snapshot: &TextSnapshot) -> Option<(usize, PersonName)> {
    snapshot
        .indexed_lines()
        .rev()
        .filter(|(_, line)| !is_physician_line(line))
        .find_map(|(idx, line)| {
            name_matches(line)
                .into_iter()
                .rev()
                .find(PersonName::is_acceptable)
                .map(|name| (idx, name))
        })
}

/// The snapshot's patient name: forward search, then backward
pub fn find_patient_name(snapshot: &TextSnapshot) -> Option<(usize, PersonName)> {
    find_patient_name_forward(snapshot).or_else(|| find_patient_name_backward(snapshot))
}

/// Normalize a raw physician name read after a label
///
/// Uppercases, drops a leading title (`DR.`, `DOCTOR`, `PHYSICIAN`), tidies
/// comma spacing and trailing punctuation. Placeholders such as `UNASSIGNED`
/// yield `None`.
pub fn normalize_physician(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();
    let stripped = TITLE_PREFIX.replace(&upper, "");

    let name = stripped
        .split(',')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let name = name.trim_end_matches(['.', ',', ';', ':']).trim();

    let all_placeholder = name
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
        .all(|t| DENYLIST.contains(&t));

    if name.is_empty() || all_placeholder {
        None
    } else {
        Some(name.to_string())
    }
}
