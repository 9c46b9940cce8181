//! Key Normalizer
//!
//! Canonical form for product keys and rack labels. Every value written to a
//! sheet and every lookup key goes through [`normalize`] before comparison;
//! applying it to only one side is how duplicate (key, rack) rows appear.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Uppercase, trim, and collapse internal whitespace runs to one space.
///
/// Empty input (or input made only of whitespace) normalizes to `""`.
///
/// ```
/// use stockguard::normalize::normalize;
///
/// assert_eq!(normalize(" ab  CD "), "AB CD");
/// assert_eq!(normalize("\t\n"), "");
/// ```
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    WHITESPACE_RUN.replace_all(trimmed, " ").to_uppercase()
}
