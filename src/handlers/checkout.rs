//! Checkout link endpoint
//!
//! Hands out the configured payment link for the single purchasable plan.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::handlers::types::{CheckoutRequest, CheckoutResponse};
use crate::intake::InvalidInput;
use crate::metrics::Endpoint;

/// The only plan that can be purchased
pub const PRO_PLAN: &str = "pro";

pub async fn handler(
    State(state): State<AppState>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> AppResult<Json<CheckoutResponse>> {
    let result = checkout(&state, body);
    state.observe(Endpoint::Checkout, result).map(Json)
}

fn checkout(
    state: &AppState,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> AppResult<CheckoutResponse> {
    let Json(request) = body.map_err(|e| InvalidInput::Malformed(e.body_text()))?;

    let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
    if !present(&request.user_id) || !present(&request.user_email) || !present(&request.plan) {
        return Err(InvalidInput::Malformed(
            "missing required fields: userId, userEmail, plan".to_string(),
        )
        .into());
    }

    let link = state.config().upstream.checkout_link().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Checkout not configured. Please contact support.".to_string(),
        )
    })?;

    let plan = request.plan.unwrap_or_default();
    if plan != PRO_PLAN {
        return Err(InvalidInput::Malformed(format!(
            "unknown plan '{}', only \"{}\" is available for purchase",
            plan, PRO_PLAN
        ))
        .into());
    }

    tracing::info!(plan = %plan, "Issued checkout link");

    Ok(CheckoutResponse {
        checkout_url: link.to_string(),
        plan,
        message: "Checkout session created successfully",
    })
}
