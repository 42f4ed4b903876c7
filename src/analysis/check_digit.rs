//! Mod-11 check digit for 9-digit billing numbers
//!
//! The first eight digits are weighted `9, 8, 7, 6, 5, 4, 3, 2`. The check
//! digit is `11 - (sum mod 11)`, where 11 maps to 0 and 10 means the prefix
//! has no valid check digit.

/// Weights applied to the eight prefix digits
pub const WEIGHTS: [u32; 8] = [9, 8, 7, 6, 5, 4, 3, 2];

/// Compute the check digit for an 8-digit prefix
///
/// Returns `None` for malformed input or prefixes that cannot be completed.
pub fn compute(prefix: &str) -> Option<u8> {
    let digits = parse_digits(prefix)?;
    if digits.len() != WEIGHTS.len() {
        return None;
    }

    let sum: u32 = digits.iter().zip(WEIGHTS.iter()).map(|(d, w)| d * w).sum();
    match 11 - (sum % 11) {
        11 => Some(0),
        10 => None,
        check => Some(check as u8),
    }
}

/// Whether a 9-digit number carries a correct check digit
pub fn is_valid(number: &str) -> bool {
    let Some(digits) = parse_digits(number) else {
        return false;
    };
    if digits.len() != 9 {
        return false;
    }
    match compute(&number[..8]) {
        Some(check) => u32::from(check) == digits[8],
        None => false,
    }
}

fn parse_digits(s: &str) -> Option<Vec<u32>> {
    s.chars().map(|c| c.to_digit(10)).collect()
}
