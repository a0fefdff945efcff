//! Request and response bodies of the public API

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intake::RequestMetadata;
use crate::itinerary::{ChatReply, ResolvedItinerary};
use crate::prompt::ChatTurn;

/// The only `requestType` accepted by `/api/gemini`
pub const ITINERARY_REQUEST_TYPE: &str = "itinerary_generation";

/// Body of `POST /api/gemini`
///
/// `userInput` is kept as raw JSON so a non-string value can be reported
/// as invalid input rather than a body rejection. `prompt` is the legacy
/// name of the same field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    #[serde(default)]
    pub user_input: Option<Value>,
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

impl GeminiRequest {
    pub fn input(&self) -> Option<&Value> {
        first_present(&self.user_input, &self.prompt)
    }
}

/// Body of `POST /api/generate-itinerary`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryRequest {
    #[serde(default)]
    pub user_input: Option<Value>,
    #[serde(default)]
    pub prompt: Option<Value>,
}

impl ItineraryRequest {
    pub fn input(&self) -> Option<&Value> {
        first_present(&self.user_input, &self.prompt)
    }
}

fn first_present<'a>(primary: &'a Option<Value>, legacy: &'a Option<Value>) -> Option<&'a Value> {
    primary
        .as_ref()
        .filter(|v| !v.is_null())
        .or(legacy.as_ref())
}

/// Body of `POST /api/chat`; the last entry of `messages` is the one answered
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
}

/// Body of `POST /api/create-checkout`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
}

/// Request facts echoed back with successful generations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub processing_time_ms: u64,
    pub word_count: usize,
    pub has_specific_dates: bool,
    pub is_multi_city: bool,
    pub model: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ResponseMetadata {
    pub fn new(request: &RequestMetadata, processing_time_ms: u64, model: &str) -> Self {
        Self {
            processing_time_ms,
            word_count: request.word_count,
            has_specific_dates: request.has_specific_dates,
            is_multi_city: request.is_multi_city,
            model: model.to_string(),
            truncated: false,
        }
    }
}

/// Body of a buffered `/api/gemini` answer
///
/// `response` is always text: the resolved itinerary re-encoded as compact
/// JSON, or the raw partial text of a token-limited generation.
#[derive(Debug, Serialize)]
pub struct GeminiResponse {
    pub response: String,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ItineraryResponse {
    pub itinerary: ResolvedItinerary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub processing_time_ms: u64,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: ChatReply,
    pub metadata: ChatMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub plan: String,
    pub message: &'static str,
}
