//! Metadata extraction from sanitized input
//!
//! Lightweight, regex-based signals used to select prompt variants and echoed
//! back in response envelopes. Extraction is pure and never fails.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

// Digit, word and boundary classes are ASCII-only throughout.

/// Numeric (`16-10-2025`, `2025/10/16`) and worded (`16 Oct 2025`) dates
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{4}|[0-9]{4}[-/][0-9]{1,2}[-/][0-9]{1,2}|[0-9]{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)(?-u:\w)*\s+[0-9]{4}",
    )
    .expect("date pattern is valid")
});

/// Independent multi-city indicators; any match marks the trip as multi-city
static MULTI_CITY_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // "multi-city", "multicity", "cities"
        Regex::new(r"(?i)(?-u:\b)(?:multi.?city|cities)(?-u:\b)").expect("token pattern is valid"),
        // "visiting: Paris, Rome"
        Regex::new(r"(?i)(?-u:\b)visiting:?\s*(?-u:\w)+.*,.*(?-u:\w)+").expect("list pattern is valid"),
        // "then Rome, Florence"
        Regex::new(r"(?i)(?-u:\b)then\s+(?-u:\w)+\s*,?\s*(?-u:\w)+").expect("transition pattern is valid"),
        // "and Porto (3 days)"
        Regex::new(r"(?i)(?-u:\b)and\s+(?-u:\w)+\s*\([0-9]+\s*days?\)").expect("duration pattern is valid"),
    ]
});

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://").expect("url pattern is valid"));

/// Signals derived from one request's sanitized text
///
/// Created per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub has_specific_dates: bool,
    pub is_multi_city: bool,
    pub found_dates: Vec<String>,
    pub word_count: usize,
    pub contains_urls: bool,
}

/// Derive [`RequestMetadata`] from sanitized text
pub fn extract(sanitized: &str) -> RequestMetadata {
    let found_dates: Vec<String> = DATE_PATTERN
        .find_iter(sanitized)
        .map(|m| m.as_str().to_string())
        .collect();

    let is_multi_city = MULTI_CITY_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(sanitized));

    RequestMetadata {
        has_specific_dates: !found_dates.is_empty(),
        is_multi_city,
        found_dates,
        word_count: sanitized.split_whitespace().count(),
        contains_urls: URL_PATTERN.is_match(sanitized),
    }
}
