//! Normalized upstream response
//!
//! The resolver only ever sees [`RawModelResponse`]; wire-level details of
//! the generative-language API are flattened into it by
//! [`crate::upstream::types`].

use serde::{Deserialize, Serialize};

/// Why the model stopped generating
///
/// Prompt-level and content-policy blocks (`BLOCKLIST`, `PROHIBITED_CONTENT`,
/// `SPII`) are folded into [`FinishReason::Safety`]; unknown values become
/// [`FinishReason::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    Stop,
    #[serde(alias = "BLOCKLIST", alias = "PROHIBITED_CONTENT", alias = "SPII")]
    Safety,
    MaxTokens,
    Recitation,
    #[serde(other)]
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "STOP",
            FinishReason::Safety => "SAFETY",
            FinishReason::MaxTokens => "MAX_TOKENS",
            FinishReason::Recitation => "RECITATION",
            FinishReason::Other => "OTHER",
        }
    }
}

/// One safety category score reported alongside a candidate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

/// Text payload, finish reason and safety ratings of one upstream reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModelResponse {
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub safety_ratings: Vec<SafetyRating>,
}

impl RawModelResponse {
    /// A completed reply carrying `text`
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            finish_reason: Some(FinishReason::Stop),
            safety_ratings: Vec::new(),
        }
    }

    /// A reply with no text
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Text with surrounding whitespace removed; whitespace-only is `""`
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }

    /// Character count of the raw text, for log fields
    pub fn text_chars(&self) -> usize {
        self.text.as_deref().map(|t| t.chars().count()).unwrap_or(0)
    }
}
