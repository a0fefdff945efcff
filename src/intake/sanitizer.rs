//! Input sanitizer
//!
//! Validates and cleans raw user text. Lengths are counted in Unicode scalar
//! values, not bytes.

use thiserror::Error;

/// Maximum accepted input length in characters (after trimming)
pub const MAX_INPUT_CHARS: usize = 10_000;

/// Reasons user input is rejected
///
/// Messages are user-facing: they describe the caller's own input and are
/// returned verbatim in the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("Invalid input: userInput is required")]
    Missing,

    #[error("Invalid input: must be a non-empty string")]
    NotText,

    #[error("Invalid input: cannot be empty")]
    Empty,

    #[error("Invalid input: too long (max 10,000 characters, got {chars})")]
    TooLong { chars: usize },

    #[error("Invalid input: {0}")]
    Malformed(String),
}

/// Characters stripped from user input
///
/// C0 controls except tab, LF and CR; DEL and the C1 block; angle brackets.
fn is_stripped(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}'..='\u{9F}' | '<' | '>'
    )
}

/// Validate and clean raw user text
///
/// Fails when the trimmed text is empty or longer than [`MAX_INPUT_CHARS`].
/// On success control characters and angle brackets are removed, the result
/// is trimmed again and capped at [`MAX_INPUT_CHARS`].
///
/// The second trim keeps the function idempotent: stripping can expose
/// leading or trailing whitespace (`"<  paris"`), which a later call would
/// otherwise remove.
pub fn sanitize(raw: &str) -> Result<String, InvalidInput> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidInput::Empty);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(InvalidInput::TooLong { chars });
    }

    let stripped: String = trimmed.chars().filter(|c| !is_stripped(*c)).collect();
    let cleaned: String = stripped.trim().chars().take(MAX_INPUT_CHARS).collect();

    if cleaned.is_empty() {
        return Err(InvalidInput::Empty);
    }
    Ok(cleaned)
}

/// Sanitize a JSON field that should hold user text
///
/// Absent or `null` fields are [`InvalidInput::Missing`]; any non-string
/// value is [`InvalidInput::NotText`].
pub fn sanitize_value(raw: Option<&serde_json::Value>) -> Result<String, InvalidInput> {
    match raw {
        None | Some(serde_json::Value::Null) => Err(InvalidInput::Missing),
        Some(serde_json::Value::String(text)) => sanitize(text),
        Some(_) => Err(InvalidInput::NotText),
    }
}

/// Short, single-line preview of sanitized input for log lines
pub fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 100;
    let mut out: String = text
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
