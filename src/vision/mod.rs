//! Vision/OCR Layer
//!
//! Turns recognized frame text into line-oriented snapshots for field
//! extraction. The recognition engine is pluggable through [`OcrEngine`].

pub mod ocr;

pub use ocr::{OcrEngine, OcrError, ScriptedOcr};

/// Plain text recognized from one camera frame
///
/// Lines are trimmed and empty lines are dropped, so a snapshot always has at
/// least one line of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    /// Index of the frame this text came from
    pub frame_index: u64,
    lines: Vec<String>,
}

impl TextSnapshot {
    /// Build a snapshot from raw OCR output
    ///
    /// Returns `None` when the text has no non-blank line.
    pub fn from_text(frame_index: u64, text: &str) -> Option<Self> {
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(Self { frame_index, lines })
        }
    }

    /// All lines, top to bottom
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the snapshot has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines with their indices, top to bottom
    pub fn indexed_lines(&self) -> impl DoubleEndedIterator<Item = (usize, &str)> {
        self.lines.iter().enumerate().map(|(i, l)| (i, l.as_str()))
    }

    /// The last `n` lines with their indices, top to bottom
    pub fn tail(&self, n: usize) -> impl Iterator<Item = (usize, &str)> {
        let start = self.lines.len().saturating_sub(n);
        self.indexed_lines().skip(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_trims_and_drops_blank_lines() {
        let snapshot = TextSnapshot::from_text(4, "  SK# 790112233 \n\n   \nSMITH, JOHN A\n").unwrap();
        assert_eq!(snapshot.frame_index, 4);
        assert_eq!(snapshot.lines(), &["SK# 790112233", "SMITH, JOHN A"]);
    }

    #[test]
    fn test_blank_text_is_no_snapshot() {
        assert!(TextSnapshot::from_text(0, "").is_none());
        assert!(TextSnapshot::from_text(0, " \n\t\n").is_none());
    }

    #[test]
    fn test_tail() {
        let snapshot = TextSnapshot::from_text(0, "a\nb\nc\nd").unwrap();
        let tail: Vec<_> = snapshot.tail(3).collect();
        assert_eq!(tail, vec![(1, "b"), (2, "c"), (3, "d")]);

        let all: Vec<_> = snapshot.tail(10).collect();
        assert_eq!(all.len(), 4);
    }
}
