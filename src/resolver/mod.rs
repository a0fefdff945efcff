//! Response resolution
//!
//! Turns one [`RawModelResponse`] into either a parsed value or a classified
//! failure. Checks run in a fixed order and the first terminal one wins:
//!
//! 1. finish reason `SAFETY` with no text → [`ResolveError::SafetyFiltered`]
//! 2. finish reason `MAX_TOKENS` → [`Resolution::Truncated`] when more than
//!    [`PARTIAL_TEXT_MIN_CHARS`] characters survived, else
//!    [`ResolveError::MaxTokensExceeded`]
//! 3. empty or whitespace-only text → [`ResolveError::EmptyResponse`]
//! 4. a ```` ```json ```` fence whose interior parses → [`Resolution::Complete`]
//! 5. the slice from the first `{` to the last `}` → parsed value,
//!    [`ResolveError::NoJsonFound`] or [`ResolveError::MalformedJson`]
//!
//! Resolution is generic over the target type, so a well-formed JSON object
//! that does not fit the target's shape is reported as malformed.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::upstream::{FinishReason, RawModelResponse};

/// Minimum partial text, in characters, worth returning after a token-limit stop
pub const PARTIAL_TEXT_MIN_CHARS: usize = 100;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("fence pattern is valid"));

/// Where the parsed value was found in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Fenced,
    BracketScan,
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Complete { value: T, source: ExtractionSource },
    /// Generation hit the token limit; the partial text is passed on as-is
    Truncated { partial_text: String },
}

impl<T> Resolution<T> {
    /// Metric label for this outcome
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Resolution::Complete { .. } => "complete",
            Resolution::Truncated { .. } => "truncated",
        }
    }
}

/// Classified resolution failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("upstream returned no text")]
    EmptyResponse,

    #[error("upstream blocked the content on safety grounds")]
    SafetyFiltered,

    #[error("upstream hit its token limit with {partial_chars} characters of text")]
    MaxTokensExceeded { partial_chars: usize },

    #[error("no JSON object in {response_chars} characters of upstream text")]
    NoJsonFound { response_chars: usize },

    #[error("upstream JSON did not parse: {reason}")]
    MalformedJson { reason: String },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::EmptyResponse => ErrorKind::EmptyResponse,
            ResolveError::SafetyFiltered => ErrorKind::SafetyFiltered,
            ResolveError::MaxTokensExceeded { .. } => ErrorKind::MaxTokensExceeded,
            ResolveError::NoJsonFound { .. } => ErrorKind::NoJsonFound,
            ResolveError::MalformedJson { .. } => ErrorKind::MalformedJson,
        }
    }
}

/// Resolve `raw` into a `T`
pub fn resolve<T: DeserializeOwned>(raw: &RawModelResponse) -> Result<Resolution<T>, ResolveError> {
    let text = raw.trimmed_text();

    match raw.finish_reason {
        Some(FinishReason::Safety) if text.is_empty() => {
            return Err(ResolveError::SafetyFiltered);
        }
        Some(FinishReason::MaxTokens) => {
            let partial_chars = text.chars().count();
            if partial_chars > PARTIAL_TEXT_MIN_CHARS {
                return Ok(Resolution::Truncated {
                    partial_text: text.to_string(),
                });
            }
            return Err(ResolveError::MaxTokensExceeded { partial_chars });
        }
        _ => {}
    }

    if text.is_empty() {
        return Err(ResolveError::EmptyResponse);
    }

    if let Some(interior) = extract_fenced(text) {
        match serde_json::from_str::<T>(interior) {
            Ok(value) => {
                return Ok(Resolution::Complete {
                    value,
                    source: ExtractionSource::Fenced,
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "Fenced block did not parse, falling back to bracket scan");
            }
        }
    }

    let candidate = bracket_slice(text).ok_or(ResolveError::NoJsonFound {
        response_chars: text.chars().count(),
    })?;

    serde_json::from_str::<T>(candidate)
        .map(|value| Resolution::Complete {
            value,
            source: ExtractionSource::BracketScan,
        })
        .map_err(|e| ResolveError::MalformedJson {
            reason: e.to_string(),
        })
}

/// Interior of the first ```` ```json ```` fence, trimmed
pub fn extract_fenced(text: &str) -> Option<&str> {
    JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Slice from the first `{` through the last `}`
///
/// `None` when either brace is missing or the last `}` precedes the first `{`.
pub fn bracket_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod extraction_tests;
