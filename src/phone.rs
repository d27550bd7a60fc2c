//! Phone number normalization.
//!
//! Leads arrive with whatever formatting the CRM forms captured
//! ("(555) 123-4567", "555.123.4567", "+1 555 123 4567"). The transport
//! needs E.164 and the inbound matcher needs a canonical form, so both go
//! through here.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;

fn e164_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+[1-9]\d{6,14}$").unwrap())
}

/// Normalize a raw phone string to E.164.
///
/// Bare 10-digit numbers are assumed NANP and prefixed `+1`; 11-digit
/// numbers starting with 1 likewise. Anything that doesn't reduce to a
/// valid E.164 shape is a `ValidationError` and is never retried.
pub fn normalize(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let had_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let candidate = if had_plus {
        format!("+{digits}")
    } else if digits.len() == 10 {
        format!("+1{digits}")
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{digits}")
    } else {
        format!("+{digits}")
    };

    if e164_pattern().is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(ValidationError::BadPhone {
            value: raw.to_string(),
        })
    }
}

/// Canonical matching key for inbound-sender lookup: the last ten digits.
///
/// Tolerates stored leads that were saved without a country code while the
/// provider reports the full E.164 sender.
pub fn match_key(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(10);
    digits[start..].to_string()
}
