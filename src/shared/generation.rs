//! Itinerary generation pipeline shared by the generation endpoints
//!
//! `/api/gemini` and `/api/generate-itinerary` (and the streaming fallback)
//! run the same steps: sanitize, assemble, invoke, resolve, validate. They
//! differ only in how a truncated result is surfaced.

use serde_json::Value;
use std::time::Instant;

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::intake::{RequestMetadata, extract, preview, sanitize_value};
use crate::itinerary::ResolvedItinerary;
use crate::middleware::RequestId;
use crate::models::ModelId;
use crate::resolver::{Resolution, ResolveError, resolve};
use crate::upstream::GenerationRequest;

/// Sanitized user text and the signals derived from it
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub text: String,
    pub metadata: RequestMetadata,
}

/// Validate the raw input field and derive its metadata
pub fn prepare_input(raw: Option<&Value>, request_id: RequestId) -> AppResult<PreparedInput> {
    let text = sanitize_value(raw)?;
    let metadata = extract(&text);

    tracing::info!(
        request_id = %request_id,
        input_preview = %preview(&text),
        word_count = metadata.word_count,
        has_specific_dates = metadata.has_specific_dates,
        is_multi_city = metadata.is_multi_city,
        "Accepted itinerary request"
    );

    Ok(PreparedInput { text, metadata })
}

/// Result of a non-streaming itinerary generation
#[derive(Debug)]
pub enum ItineraryOutcome {
    Complete {
        itinerary: ResolvedItinerary,
        warnings: Vec<String>,
    },
    Truncated {
        partial_text: String,
    },
}

/// Finished generation with the model that produced it
#[derive(Debug)]
pub struct Generated {
    pub outcome: ItineraryOutcome,
    pub model: ModelId,
    pub started: Instant,
}

impl Generated {
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Invoke the itinerary chain and resolve the reply
pub async fn generate_itinerary(
    state: &AppState,
    input: &PreparedInput,
    request_id: RequestId,
) -> AppResult<Generated> {
    let started = Instant::now();
    let config = state.config();

    let prompt = state.prompts().itinerary(&input.text, &input.metadata);
    let request = GenerationRequest::new(prompt, config.generation.itinerary.clone());

    let invocation = state
        .invoker()
        .invoke(
            &request,
            &config.models.itinerary,
            config.timeouts.generation(),
            request_id,
        )
        .await?;

    let resolution = resolve::<ResolvedItinerary>(&invocation.response);
    record_resolution(state, &resolution, request_id, &invocation.model);

    let outcome = match resolution? {
        Resolution::Complete { value, source } => {
            tracing::debug!(request_id = %request_id, source = ?source, "Itinerary resolved");
            let warnings = check_schedule(&value, config.resolver.strict_schema, request_id)?;
            ItineraryOutcome::Complete {
                itinerary: value,
                warnings,
            }
        }
        Resolution::Truncated { partial_text } => {
            tracing::warn!(
                request_id = %request_id,
                model = %invocation.model,
                partial_chars = partial_text.chars().count(),
                "Generation hit the token limit, keeping partial text"
            );
            ItineraryOutcome::Truncated { partial_text }
        }
    };

    Ok(Generated {
        outcome,
        model: invocation.model,
        started,
    })
}

/// Record the resolver outcome and log failures with their detail
pub fn record_resolution<T>(
    state: &AppState,
    resolution: &Result<Resolution<T>, ResolveError>,
    request_id: RequestId,
    model: &ModelId,
) {
    let label = match resolution {
        Ok(r) => r.outcome_label(),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                model = %model,
                error = %e,
                "Model reply could not be resolved"
            );
            e.kind().code()
        }
    };
    let metrics = state.metrics();
    metrics.record_or_log("record_resolution", metrics.record_resolution(label));
}

/// Schedule issues as warnings, or a failure when `strict`
pub fn check_schedule(
    itinerary: &ResolvedItinerary,
    strict: bool,
    request_id: RequestId,
) -> AppResult<Vec<String>> {
    let issues: Vec<String> = itinerary.validate().iter().map(ToString::to_string).collect();
    if issues.is_empty() {
        return Ok(issues);
    }

    tracing::warn!(
        request_id = %request_id,
        issue_count = issues.len(),
        strict,
        issues = ?issues,
        "Itinerary schedule has structural issues"
    );

    if strict {
        Err(AppError::SchemaViolation(issues))
    } else {
        Ok(issues)
    }
}
