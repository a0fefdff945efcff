//! `POST /api/generate-itinerary`
//!
//! Returns a typed itinerary only. A token-limited generation has no complete
//! itinerary to offer, so it is reported as `MAX_TOKENS_EXCEEDED`.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};

use crate::error::AppResult;
use crate::handlers::AppState;
use crate::handlers::types::{ItineraryRequest, ItineraryResponse};
use crate::intake::InvalidInput;
use crate::metrics::Endpoint;
use crate::middleware::RequestId;
use crate::resolver::ResolveError;
use crate::shared::{ItineraryOutcome, generate_itinerary, prepare_input};

pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<ItineraryRequest>, JsonRejection>,
) -> AppResult<Json<ItineraryResponse>> {
    let result = generate(&state, request_id, body).await;
    state.observe(Endpoint::GenerateItinerary, result).map(Json)
}

async fn generate(
    state: &AppState,
    request_id: RequestId,
    body: Result<Json<ItineraryRequest>, JsonRejection>,
) -> AppResult<ItineraryResponse> {
    let Json(request) = body.map_err(|e| InvalidInput::Malformed(e.body_text()))?;
    let input = prepare_input(request.input(), request_id)?;
    state.require_api_key()?;

    let generated = generate_itinerary(state, &input, request_id).await?;
    let elapsed_ms = generated.elapsed_ms();

    match generated.outcome {
        ItineraryOutcome::Complete {
            itinerary,
            warnings,
        } => {
            tracing::info!(
                request_id = %request_id,
                model = %generated.model,
                days = itinerary.days.len(),
                elapsed_ms,
                "Itinerary generated"
            );
            Ok(ItineraryResponse {
                itinerary,
                warnings,
            })
        }
        ItineraryOutcome::Truncated { partial_text } => Err(ResolveError::MaxTokensExceeded {
            partial_chars: partial_text.chars().count(),
        }
        .into()),
    }
}
