//! `POST /api/gemini`
//!
//! Itinerary generation in two delivery modes. The buffered mode answers with
//! `{response, metadata, warnings?}`, where `response` is the itinerary as
//! JSON text. With `stream: true` the model's text is
//! forwarded as `text/plain` fragments as it arrives.
//!
//! Streaming commits on the first fragment. When every streaming candidate
//! fails before that point the request falls back, once, to the buffered
//! chain and delivers the resolved itinerary as a single text body marked
//! with `x-stream-fallback: true`. A stream that breaks after commit is not
//! retried; the client keeps what it already received.

use axum::{
    Extension, Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::convert::Infallible;

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::handlers::types::{
    GeminiRequest, GeminiResponse, ITINERARY_REQUEST_TYPE, ResponseMetadata,
};
use crate::intake::InvalidInput;
use crate::metrics::Endpoint;
use crate::middleware::RequestId;
use crate::models::InvocationError;
use crate::shared::{ItineraryOutcome, PreparedInput, generate_itinerary, prepare_input};
use crate::itinerary::ResolvedItinerary;
use crate::upstream::GenerationRequest;

/// Set on streaming responses that were served by the buffered chain
pub const STREAM_FALLBACK_HEADER: &str = "x-stream-fallback";

pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<GeminiRequest>, JsonRejection>,
) -> AppResult<Response> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) => {
            let err = AppError::from(InvalidInput::Malformed(e.body_text()));
            return state.observe(Endpoint::Gemini, Err(err));
        }
    };

    if request.stream {
        let result = stream(&state, request_id, &request).await;
        state.observe(Endpoint::GeminiStream, result)
    } else {
        let result = buffered(&state, request_id, &request)
            .await
            .map(|response| Json(response).into_response());
        state.observe(Endpoint::Gemini, result)
    }
}

fn accept(request: &GeminiRequest, request_id: RequestId) -> AppResult<PreparedInput> {
    if let Some(request_type) = &request.request_type {
        if request_type != ITINERARY_REQUEST_TYPE {
            return Err(InvalidInput::Malformed(format!(
                "unsupported requestType, only \"{}\" is supported",
                ITINERARY_REQUEST_TYPE
            ))
            .into());
        }
    }
    prepare_input(request.input(), request_id)
}

async fn buffered(
    state: &AppState,
    request_id: RequestId,
    request: &GeminiRequest,
) -> AppResult<GeminiResponse> {
    let input = accept(request, request_id)?;
    state.require_api_key()?;

    let generated = generate_itinerary(state, &input, request_id).await?;
    let mut metadata = ResponseMetadata::new(
        &input.metadata,
        generated.elapsed_ms(),
        generated.model.short_name(),
    );

    Ok(match generated.outcome {
        ItineraryOutcome::Complete {
            itinerary,
            warnings,
        } => GeminiResponse {
            response: encode(&itinerary)?,
            metadata,
            warnings,
        },
        ItineraryOutcome::Truncated { partial_text } => {
            metadata.truncated = true;
            GeminiResponse {
                response: partial_text,
                metadata,
                warnings: Vec::new(),
            }
        }
    })
}

async fn stream(
    state: &AppState,
    request_id: RequestId,
    request: &GeminiRequest,
) -> AppResult<Response> {
    let input = accept(request, request_id)?;
    state.require_api_key()?;

    let config = state.config();
    let prompt = state.prompts().itinerary(&input.text, &input.metadata);
    let generation = GenerationRequest::new(prompt, config.generation.streaming.clone());

    let opened = state
        .invoker()
        .open_stream(
            &generation,
            &config.models.streaming,
            config.timeouts.generation(),
            request_id,
        )
        .await;

    match opened {
        Ok(committed) => {
            tracing::info!(
                request_id = %request_id,
                model = %committed.model,
                attempt = committed.attempt,
                prior_failures = committed.failures.len(),
                "Streaming itinerary"
            );
            let fragments = committed.into_text_stream().map(Ok::<_, Infallible>);
            Ok(text_response(Body::from_stream(fragments), false))
        }
        Err(
            e @ (InvocationError::AllModelsFailed { .. } | InvocationError::RateLimited { .. }),
        ) => {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "Streaming chain failed before commit, falling back to buffered generation"
            );
            let generated = generate_itinerary(state, &input, request_id).await?;
            let text = match generated.outcome {
                ItineraryOutcome::Complete { itinerary, .. } => encode(&itinerary)?,
                ItineraryOutcome::Truncated { partial_text } => partial_text,
            };
            Ok(text_response(Body::from(text), true))
        }
        Err(e) => Err(e.into()),
    }
}

fn encode(itinerary: &ResolvedItinerary) -> AppResult<String> {
    serde_json::to_string(itinerary)
        .map_err(|e| AppError::Internal(format!("Failed to encode itinerary: {}", e)))
}

fn text_response(body: Body, fallback: bool) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    if fallback {
        headers.insert(
            HeaderName::from_static(STREAM_FALLBACK_HEADER),
            HeaderValue::from_static("true"),
        );
    }
    response
}
