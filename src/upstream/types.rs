//! Wire types for the generative-language `generateContent` API
//!
//! Field names follow the API's camelCase JSON. Only the fields the gateway
//! reads are modelled; everything else is ignored on deserialization.

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::upstream::response::{FinishReason, RawModelResponse, SafetyRating};

/// Request body for `:generateContent` and `:streamGenerateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: WireGenerationConfig,
}

impl GenerateContentRequest {
    /// Single-turn request carrying `prompt` as the only user part
    pub fn single_turn(prompt: &str, config: &GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: WireGenerationConfig::from(config),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub candidate_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
            candidate_count: config.candidate_count,
            response_mime_type: config.response_mime_type.clone(),
        }
    }
}

/// Response body of `:generateContent`, and of each streamed chunk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

impl GenerateContentResponse {
    /// Concatenated text of every part of the first candidate
    pub fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut texts = content.parts.iter().filter_map(|p| p.text.as_deref()).peekable();
        texts.peek()?;
        Some(texts.collect())
    }
}

impl From<GenerateContentResponse> for RawModelResponse {
    fn from(response: GenerateContentResponse) -> Self {
        let text = response.first_text();
        let GenerateContentResponse {
            candidates,
            prompt_feedback,
        } = response;

        match candidates.into_iter().next() {
            Some(candidate) => RawModelResponse {
                text,
                finish_reason: candidate.finish_reason,
                safety_ratings: candidate.safety_ratings,
            },
            None => {
                // A prompt blocked before generation yields no candidates at all
                let feedback = prompt_feedback.unwrap_or_default();
                RawModelResponse {
                    text: None,
                    finish_reason: feedback.block_reason.as_ref().map(|_| FinishReason::Safety),
                    safety_ratings: feedback.safety_ratings,
                }
            }
        }
    }
}
