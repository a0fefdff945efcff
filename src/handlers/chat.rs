//! `POST /api/chat`
//!
//! Conversational entry point. The model is asked for a JSON object tagged
//! `chat`, `refinement` or `itinerary`; plain prose without any JSON object
//! is accepted as a `chat` reply.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use std::time::Instant;

use crate::error::AppResult;
use crate::handlers::AppState;
use crate::handlers::types::{ChatMetadata, ChatRequest, ChatResponse};
use crate::intake::{InvalidInput, preview, sanitize};
use crate::itinerary::ChatReply;
use crate::metrics::Endpoint;
use crate::middleware::RequestId;
use crate::resolver::{Resolution, ResolveError, resolve};
use crate::shared::{check_schedule, record_resolution};
use crate::upstream::{GenerationRequest, RawModelResponse};

pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let result = converse(&state, request_id, body).await;
    state.observe(Endpoint::Chat, result).map(Json)
}

async fn converse(
    state: &AppState,
    request_id: RequestId,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<ChatResponse> {
    let started = Instant::now();
    let Json(request) = body.map_err(|e| InvalidInput::Malformed(e.body_text()))?;

    let latest = request
        .messages
        .last()
        .ok_or_else(|| InvalidInput::Malformed("messages array is required".to_string()))?;
    let latest = sanitize(&latest.content)?;
    state.require_api_key()?;

    tracing::info!(
        request_id = %request_id,
        input_preview = %preview(&latest),
        history_len = request.conversation_history.len(),
        "Accepted chat request"
    );

    let config = state.config();
    let prompt = state
        .prompts()
        .chat(&latest, &request.conversation_history);
    let generation = GenerationRequest::new(prompt, config.generation.chat.clone());

    let invocation = state
        .invoker()
        .invoke(
            &generation,
            &config.models.chat,
            config.timeouts.chat(),
            request_id,
        )
        .await?;

    let resolution = resolve::<ChatReply>(&invocation.response);
    record_resolution(state, &resolution, request_id, &invocation.model);
    let reply = interpret(resolution, &invocation.response)?;

    let warnings = match &reply {
        ChatReply::Itinerary(itinerary) => {
            check_schedule(itinerary, config.resolver.strict_schema, request_id)?
        }
        _ => Vec::new(),
    };

    Ok(ChatResponse {
        response: reply,
        metadata: ChatMetadata {
            processing_time_ms: started.elapsed().as_millis() as u64,
            model: invocation.model.short_name().to_string(),
        },
        warnings,
    })
}

/// Map a resolution onto a reply, accepting prose as a chat message
fn interpret(
    resolution: Result<Resolution<ChatReply>, ResolveError>,
    raw: &RawModelResponse,
) -> AppResult<ChatReply> {
    match resolution {
        Ok(Resolution::Complete { value, .. }) => Ok(value),
        Ok(Resolution::Truncated { partial_text }) => Err(ResolveError::MaxTokensExceeded {
            partial_chars: partial_text.chars().count(),
        }
        .into()),
        Err(ResolveError::NoJsonFound { .. }) => Ok(ChatReply::Chat {
            message: raw.trimmed_text().to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}
