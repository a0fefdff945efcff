//! Health and configuration status endpoints
//!
//! `/health` is a plain liveness probe for load balancers. `/api/status`
//! reports which collaborators are configured without revealing any values.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// RFC 3339 timestamp of the check
    pub timestamp: String,
    pub version: &'static str,
    pub environment: String,
    /// "degraded" once any metrics recording has failed, otherwise "operational"
    pub metrics_status: &'static str,
}

/// Health check handler
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let metrics_status = if state.metrics().recording_failures_count() > 0 {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            environment: state.config().server.environment.clone(),
            metrics_status,
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub services: ServiceStatus,
    pub security: SecurityStatus,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub gemini: &'static str,
    pub affiliate: &'static str,
    pub checkout: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatus {
    pub rate_limit: &'static str,
    pub cors: &'static str,
    pub security_headers: &'static str,
}

/// Configuration status handler
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let upstream = &state.config().upstream;

    Json(StatusResponse {
        status: "ready",
        services: ServiceStatus {
            gemini: if upstream.api_key().is_some() {
                "configured"
            } else {
                "missing_api_key"
            },
            affiliate: if upstream.affiliate_id().is_some() {
                "configured"
            } else {
                "missing_id"
            },
            checkout: if upstream.checkout_link().is_some() {
                "configured"
            } else {
                "missing_link"
            },
        },
        security: SecurityStatus {
            rate_limit: "enabled",
            cors: "configured",
            security_headers: "enabled",
        },
    })
}
